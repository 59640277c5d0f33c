//! Typed, read-only queries over the entity store.
//!
//! A query is a tuple of component references, e.g. `(&Health,)` or
//! `(&Health, &Sight)`. [`World::query`] walks the store in ascending entity
//! order and yields `(EntityId, (&A, &B, ...))` for every entity carrying all
//! of the requested components. Mutation goes through
//! [`World::get_component_mut`] after materialising the ids you need.

use std::marker::PhantomData;

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;
use crate::world::{ComponentMap, World};

// ---------------------------------------------------------------------------
// QueryItem
// ---------------------------------------------------------------------------

/// One element of a query tuple.
pub trait QueryItem {
    /// The value yielded per entity.
    type Item<'w>;

    /// The registered id of the component this item reads, if registered.
    fn component_type_id(world: &World) -> Option<ComponentTypeId>;

    /// Borrow the component out of an entity's component map.
    fn fetch(components: &ComponentMap, id: ComponentTypeId) -> Option<Self::Item<'_>>;
}

impl<T: Component> QueryItem for &T {
    type Item<'w> = &'w T;

    fn component_type_id(world: &World) -> Option<ComponentTypeId> {
        world.registry().lookup::<T>()
    }

    fn fetch(components: &ComponentMap, id: ComponentTypeId) -> Option<&T> {
        components.get(&id)?.downcast_ref::<T>()
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A tuple of [`QueryItem`]s.
pub trait Query {
    /// The per-entity output tuple.
    type Item<'w>;

    /// Ids of every component the query needs, or `None` if any of them was
    /// never registered (in which case nothing can match).
    fn type_ids(world: &World) -> Option<Vec<ComponentTypeId>>;

    /// Fetch one entity's row. `ids` is the vector returned by
    /// [`type_ids`](Self::type_ids).
    fn fetch_row<'w>(components: &'w ComponentMap, ids: &[ComponentTypeId])
        -> Option<Self::Item<'w>>;
}

macro_rules! impl_query_tuple {
    ($($item:ident : $idx:tt),+) => {
        impl<$($item: QueryItem),+> Query for ($($item,)+) {
            type Item<'w> = ($($item::Item<'w>,)+);

            fn type_ids(world: &World) -> Option<Vec<ComponentTypeId>> {
                Some(vec![$($item::component_type_id(world)?),+])
            }

            fn fetch_row<'w>(
                components: &'w ComponentMap,
                ids: &[ComponentTypeId],
            ) -> Option<Self::Item<'w>> {
                Some(($($item::fetch(components, *ids.get($idx)?)?,)+))
            }
        }
    };
}

impl_query_tuple!(A: 0);
impl_query_tuple!(A: 0, B: 1);
impl_query_tuple!(A: 0, B: 1, C: 2);
impl_query_tuple!(A: 0, B: 1, C: 2, D: 3);

// ---------------------------------------------------------------------------
// QueryIter
// ---------------------------------------------------------------------------

/// Iterator returned by [`World::query`].
pub struct QueryIter<'w, Q: Query> {
    rows: std::collections::btree_map::Iter<'w, EntityId, ComponentMap>,
    /// `None` when a queried type is unregistered; the iterator is then empty.
    ids: Option<Vec<ComponentTypeId>>,
    _marker: PhantomData<Q>,
}

impl<'w, Q: Query> QueryIter<'w, Q> {
    pub(crate) fn new(
        rows: std::collections::btree_map::Iter<'w, EntityId, ComponentMap>,
        ids: Option<Vec<ComponentTypeId>>,
    ) -> Self {
        Self {
            rows,
            ids,
            _marker: PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = (EntityId, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let ids = self.ids.as_deref()?;
        for (&entity, components) in self.rows.by_ref() {
            if let Some(item) = Q::fetch_row(components, ids) {
                return Some((entity, item));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

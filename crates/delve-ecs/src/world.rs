//! The [`World`] is the top-level container for entities. It owns the entity
//! allocator, the component registry, every entity's component map, and the
//! [`SpatialIndex`] that binds each entity to one grid cell.
//!
//! Store and index move together: an entity is in the store if and only if
//! the index tracks its position. Every lifecycle operation below either
//! updates both or fails before touching either.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;

use tracing::trace;

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::query::{Query, QueryIter};
use crate::spatial::{Position, SpatialIndex};
use crate::EcsError;

/// Type-erased components of one entity, keyed by registered type.
pub type ComponentMap = BTreeMap<ComponentTypeId, Box<dyn Any>>;

// ---------------------------------------------------------------------------
// ComponentBundle
// ---------------------------------------------------------------------------

/// A set of components to attach in one step, at spawn time or later.
///
/// Adding a second value of the same type replaces the first, so a bundle
/// never holds duplicates. Types are resolved against the registry only when
/// the bundle is applied.
///
/// ```ignore
/// let bundle = ComponentBundle::new().with(Health(10)).with(Name("bat"));
/// world.spawn(Position::new(3, 4), bundle)?;
/// ```
#[derive(Default)]
pub struct ComponentBundle {
    entries: Vec<BundleEntry>,
}

struct BundleEntry {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any>,
}

impl ComponentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component, replacing any earlier value of the same type.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        let type_id = TypeId::of::<T>();
        let value: Box<dyn Any> = Box::new(value);
        match self.entries.iter_mut().find(|e| e.type_id == type_id) {
            Some(existing) => existing.value = value,
            None => self.entries.push(BundleEntry {
                type_id,
                type_name: std::any::type_name::<T>(),
                value,
            }),
        }
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.add(value);
        self
    }

    /// Number of distinct component types in the bundle.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map every entry to its registered id. Fails on the first unregistered
    /// type without consuming anything the caller could observe.
    fn resolve(
        self,
        registry: &ComponentRegistry,
    ) -> Result<Vec<(ComponentTypeId, Box<dyn Any>)>, EcsError> {
        self.entries
            .into_iter()
            .map(|entry| {
                registry
                    .lookup_type_id(entry.type_id)
                    .map(|id| (id, entry.value))
                    .ok_or_else(|| EcsError::UnknownComponent {
                        name: entry.type_name.to_owned(),
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for ComponentBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.type_name))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Entity store plus spatial index.
///
/// Entities live in a `BTreeMap`, so every iteration (queries included) runs
/// in ascending [`EntityId`] order.
#[derive(Default)]
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    entities: BTreeMap<EntityId, ComponentMap>,
    spatial: SpatialIndex,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("component_types", &self.registry.len())
            .field("occupied_cells", &self.spatial.occupied_cell_count())
            .finish()
    }
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type under `name`. Registering the same type
    /// again returns its existing id.
    pub fn register_component<T: Component>(
        &mut self,
        name: &str,
    ) -> Result<ComponentTypeId, EcsError> {
        self.registry.register::<T>(name)
    }

    /// The registered id of `T`.
    pub fn component_id<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
            })
    }

    // -- lifecycle ----------------------------------------------------------

    /// Create an entity at `position` with an auto-assigned identifier.
    pub fn spawn(
        &mut self,
        position: Position,
        bundle: ComponentBundle,
    ) -> Result<EntityId, EcsError> {
        let components = bundle.resolve(&self.registry)?;
        let entities = &self.entities;
        let entity = self.allocator.allocate(|id| entities.contains_key(&id));
        self.attach(entity, position, components);
        Ok(entity)
    }

    /// Create an entity with a caller-supplied identifier.
    ///
    /// Fails with [`EcsError::DuplicateIdentifier`] if `entity` is alive.
    pub fn spawn_with_id(
        &mut self,
        entity: EntityId,
        position: Position,
        bundle: ComponentBundle,
    ) -> Result<EntityId, EcsError> {
        if self.entities.contains_key(&entity) {
            return Err(EcsError::DuplicateIdentifier(entity));
        }
        let components = bundle.resolve(&self.registry)?;
        self.attach(entity, position, components);
        Ok(entity)
    }

    fn attach(
        &mut self,
        entity: EntityId,
        position: Position,
        components: Vec<(ComponentTypeId, Box<dyn Any>)>,
    ) {
        let map: ComponentMap = components.into_iter().collect();
        trace!(entity = %entity, %position, components = map.len(), "spawn");
        self.entities.insert(entity, map);
        self.spatial.insert(entity, position);
    }

    /// Remove an entity, all of its components, and its index entry.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if self.entities.remove(&entity).is_none() {
            return Err(EcsError::UnknownEntity(entity));
        }
        let position = self.spatial.remove(entity)?;
        trace!(entity = %entity, %position, "despawn");
        Ok(())
    }

    /// Whether `entity` is alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    // -- position -----------------------------------------------------------

    /// Move an entity to `target`. Bounds and collisions are not checked.
    pub fn move_entity(&mut self, entity: EntityId, target: Position) -> Result<(), EcsError> {
        self.spatial.relocate(entity, target)?;
        trace!(entity = %entity, %target, "move");
        Ok(())
    }

    /// Current position of `entity`.
    pub fn position_of(&self, entity: EntityId) -> Result<Position, EcsError> {
        self.spatial.position_of(entity)
    }

    /// Entities standing at `position`, ascending. Empty if none.
    pub fn entities_at(&self, position: Position) -> impl Iterator<Item = EntityId> + '_ {
        self.spatial.entities_at(position)
    }

    /// Read-only view of the spatial index.
    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    // -- component access ---------------------------------------------------

    /// Every component on `entity`, keyed by registered type.
    pub fn get_components(&self, entity: EntityId) -> Result<&ComponentMap, EcsError> {
        self.entities
            .get(&entity)
            .ok_or(EcsError::UnknownEntity(entity))
    }

    fn components_of_mut(&mut self, entity: EntityId) -> Result<&mut ComponentMap, EcsError> {
        self.entities
            .get_mut(&entity)
            .ok_or(EcsError::UnknownEntity(entity))
    }

    /// Borrow a component, or `None` if the entity is dead, the type is
    /// unregistered, or the entity lacks it.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let id = self.registry.lookup::<T>()?;
        self.entities.get(&entity)?.get(&id)?.downcast_ref::<T>()
    }

    /// Mutable form of [`get_component`](Self::get_component).
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = self.registry.lookup::<T>()?;
        self.entities.get_mut(&entity)?.get_mut(&id)?.downcast_mut::<T>()
    }

    /// Borrow a component, reporting why it is missing.
    pub fn component<T: Component>(&self, entity: EntityId) -> Result<&T, EcsError> {
        let id = self.component_id::<T>()?;
        self.get_components(entity)?
            .get(&id)
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or_else(|| EcsError::UnknownComponent {
                name: self.registry.name_of(id).to_owned(),
            })
    }

    /// Whether `entity` carries a `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Whether `entity` carries the component with registered id `id`.
    pub fn has_component_id(&self, entity: EntityId, id: ComponentTypeId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|components| components.contains_key(&id))
    }

    /// Registered ids of every component on `entity`, ascending.
    pub fn component_types(&self, entity: EntityId) -> Result<Vec<ComponentTypeId>, EcsError> {
        Ok(self.get_components(entity)?.keys().copied().collect())
    }

    /// Attach or replace a single component.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), EcsError> {
        let id = self.component_id::<T>()?;
        self.components_of_mut(entity)?.insert(id, Box::new(value));
        trace!(entity = %entity, component = self.registry.name_of(id), "insert component");
        Ok(())
    }

    /// Attach or replace every component in `bundle`. Nothing is applied if
    /// any type in the bundle is unregistered.
    pub fn insert_bundle(
        &mut self,
        entity: EntityId,
        bundle: ComponentBundle,
    ) -> Result<(), EcsError> {
        if !self.entities.contains_key(&entity) {
            return Err(EcsError::UnknownEntity(entity));
        }
        let components = bundle.resolve(&self.registry)?;
        let count = components.len();
        self.components_of_mut(entity)?.extend(components);
        trace!(entity = %entity, count, "insert bundle");
        Ok(())
    }

    /// Detach a component and hand it back.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<T, EcsError> {
        let id = self.component_id::<T>()?;
        let boxed = self
            .components_of_mut(entity)?
            .remove(&id)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: self.registry.name_of(id).to_owned(),
            })?;
        trace!(entity = %entity, component = self.registry.name_of(id), "remove component");
        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
            })
    }

    /// Detach several components at once.
    ///
    /// Fails with [`EcsError::UnknownComponent`] naming the first type the
    /// entity lacks; in that case none of them are removed.
    pub fn remove_components(
        &mut self,
        entity: EntityId,
        types: &[ComponentTypeId],
    ) -> Result<(), EcsError> {
        let components = self.get_components(entity)?;
        if let Some(&missing) = types.iter().find(|id| !components.contains_key(id)) {
            return Err(EcsError::UnknownComponent {
                name: self.registry.name_of(missing).to_owned(),
            });
        }
        let components = self.components_of_mut(entity)?;
        for id in types {
            components.remove(id);
        }
        trace!(entity = %entity, count = types.len(), "remove components");
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    /// Lazily yield every entity for which `predicate` holds, ascending.
    ///
    /// The iterator borrows the world; collect it before despawning or
    /// moving any of the results.
    pub fn query_entities<'w, F>(&'w self, predicate: F) -> impl Iterator<Item = EntityId> + 'w
    where
        F: Fn(&World, EntityId) -> bool + 'w,
    {
        self.entities
            .keys()
            .copied()
            .filter(move |&entity| predicate(self, entity))
    }

    /// Entities carrying every listed component type. Linear scan.
    pub fn all_with(
        &self,
        types: impl IntoIterator<Item = ComponentTypeId>,
    ) -> impl Iterator<Item = EntityId> + '_ {
        let types: Vec<ComponentTypeId> = types.into_iter().collect();
        self.query_entities(move |world, entity| {
            types.iter().all(|&id| world.has_component_id(entity, id))
        })
    }

    /// The lowest-id entity carrying a `T`.
    ///
    /// Fails with [`EcsError::NotFound`] when no entity matches.
    pub fn single_with<T: Component>(&self) -> Result<EntityId, EcsError> {
        let id = self.component_id::<T>()?;
        self.all_with([id])
            .next()
            .ok_or_else(|| EcsError::NotFound {
                component: self.registry.name_of(id).to_owned(),
            })
    }

    /// Typed read-only query; see [`crate::query`].
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        QueryIter::new(self.entities.iter(), Q::type_ids(self))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);

    #[derive(Debug, Clone, PartialEq)]
    struct Player;

    #[derive(Debug, Clone, PartialEq)]
    struct Blocker;

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Health>("health").unwrap();
        world.register_component::<Player>("player").unwrap();
        world.register_component::<Blocker>("blocker").unwrap();
        world
    }

    fn at(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn spawn_and_get() {
        let mut world = setup_world();
        let e = world
            .spawn(at(1, 2), ComponentBundle::new().with(Health(10)))
            .unwrap();
        assert!(world.is_alive(e));
        assert_eq!(world.get_component::<Health>(e), Some(&Health(10)));
        assert_eq!(world.position_of(e).unwrap(), at(1, 2));
        assert_eq!(world.entities_at(at(1, 2)).collect::<Vec<_>>(), vec![e]);
    }

    #[test]
    fn get_components_exposes_the_whole_map() {
        let mut world = setup_world();
        let e = world
            .spawn(at(0, 0), ComponentBundle::new().with(Health(3)).with(Player))
            .unwrap();
        let health = world.component_id::<Health>().unwrap();
        let components = world.get_components(e).unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(
            components[&health].downcast_ref::<Health>(),
            Some(&Health(3))
        );

        world.despawn(e).unwrap();
        assert_eq!(world.get_components(e).unwrap_err(), EcsError::UnknownEntity(e));
    }

    #[test]
    fn bundle_upserts_by_type() {
        let bundle = ComponentBundle::new().with(Health(1)).with(Health(7));
        assert_eq!(bundle.len(), 1);

        let mut world = setup_world();
        let e = world.spawn(at(0, 0), bundle).unwrap();
        assert_eq!(world.component::<Health>(e).unwrap(), &Health(7));
    }

    #[test]
    fn spawn_with_unregistered_type_fails_cleanly() {
        #[derive(Debug)]
        struct Stranger;

        let mut world = setup_world();
        let err = world
            .spawn(at(0, 0), ComponentBundle::new().with(Stranger))
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));
        assert_eq!(world.entity_count(), 0);
        assert!(world.spatial().is_empty());
    }

    #[test]
    fn duplicate_identifier_rejected() {
        let mut world = setup_world();
        let id = EntityId::from_raw(5);
        world.spawn_with_id(id, at(0, 0), ComponentBundle::new()).unwrap();
        let err = world
            .spawn_with_id(id, at(1, 1), ComponentBundle::new())
            .unwrap_err();
        assert_eq!(err, EcsError::DuplicateIdentifier(id));
        assert_eq!(world.position_of(id).unwrap(), at(0, 0));
    }

    #[test]
    fn auto_ids_skip_caller_supplied_ones() {
        let mut world = setup_world();
        world
            .spawn_with_id(EntityId::from_raw(1), at(0, 0), ComponentBundle::new())
            .unwrap();
        let e = world.spawn(at(0, 0), ComponentBundle::new()).unwrap();
        assert_eq!(e.to_raw(), 2);
    }

    #[test]
    fn despawn_removes_store_and_index() {
        let mut world = setup_world();
        let e = world
            .spawn(at(3, 3), ComponentBundle::new().with(Health(1)))
            .unwrap();
        world.despawn(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(world.entities_at(at(3, 3)).count(), 0);
        assert!(world.spatial().is_empty());
        assert_eq!(world.despawn(e), Err(EcsError::UnknownEntity(e)));
    }

    #[test]
    fn move_entity_updates_index() {
        let mut world = setup_world();
        let e = world.spawn(at(0, 0), ComponentBundle::new()).unwrap();
        world.move_entity(e, at(0, 1)).unwrap();
        assert_eq!(world.position_of(e).unwrap(), at(0, 1));
        assert_eq!(world.entities_at(at(0, 0)).count(), 0);
    }

    #[test]
    fn insert_and_remove_component() {
        let mut world = setup_world();
        let e = world.spawn(at(0, 0), ComponentBundle::new()).unwrap();
        world.insert_component(e, Health(4)).unwrap();
        world.insert_component(e, Health(6)).unwrap();
        let health = world.component_id::<Health>().unwrap();
        assert_eq!(world.component_types(e).unwrap(), vec![health]);

        let removed: Health = world.remove_component(e).unwrap();
        assert_eq!(removed, Health(6));
        assert!(!world.has_component::<Health>(e));
        assert!(matches!(
            world.remove_component::<Health>(e),
            Err(EcsError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn get_component_mut_modifies() {
        let mut world = setup_world();
        let e = world
            .spawn(at(0, 0), ComponentBundle::new().with(Health(10)))
            .unwrap();
        world.get_component_mut::<Health>(e).unwrap().0 -= 3;
        assert_eq!(world.get_component::<Health>(e), Some(&Health(7)));
    }

    #[test]
    fn remove_components_is_all_or_nothing() {
        let mut world = setup_world();
        let e = world
            .spawn(at(0, 0), ComponentBundle::new().with(Health(1)).with(Player))
            .unwrap();
        let health = world.component_id::<Health>().unwrap();
        let player = world.component_id::<Player>().unwrap();
        let blocker = world.component_id::<Blocker>().unwrap();

        let err = world.remove_components(e, &[health, blocker]).unwrap_err();
        assert_eq!(
            err,
            EcsError::UnknownComponent {
                name: "blocker".into()
            }
        );
        assert!(world.has_component::<Health>(e));

        world.remove_components(e, &[health, player]).unwrap();
        assert!(world.component_types(e).unwrap().is_empty());
    }

    #[test]
    fn all_with_filters_by_every_type() {
        let mut world = setup_world();
        let a = world
            .spawn(at(0, 0), ComponentBundle::new().with(Health(1)).with(Blocker))
            .unwrap();
        world
            .spawn(at(0, 0), ComponentBundle::new().with(Health(2)))
            .unwrap();
        let ids = [
            world.component_id::<Health>().unwrap(),
            world.component_id::<Blocker>().unwrap(),
        ];
        assert_eq!(world.all_with(ids).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn single_with_returns_lowest_id() {
        let mut world = setup_world();
        assert_eq!(
            world.single_with::<Player>(),
            Err(EcsError::NotFound {
                component: "player".into()
            })
        );
        world
            .spawn_with_id(EntityId::from_raw(8), at(0, 0), ComponentBundle::new().with(Player))
            .unwrap();
        world
            .spawn_with_id(EntityId::from_raw(4), at(0, 0), ComponentBundle::new().with(Player))
            .unwrap();
        assert_eq!(world.single_with::<Player>().unwrap(), EntityId::from_raw(4));
    }

    #[test]
    fn materialised_query_allows_despawn() {
        let mut world = setup_world();
        for x in 0..5 {
            world
                .spawn(at(x, 0), ComponentBundle::new().with(Health(x)))
                .unwrap();
        }
        let dead: Vec<EntityId> = world
            .query_entities(|w, e| w.get_component::<Health>(e).is_some_and(|h| h.0 % 2 == 0))
            .collect();
        for e in dead {
            world.despawn(e).unwrap();
        }
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.spatial().len(), 2);
    }
}

//! Component type registration and metadata.
//!
//! The set of component kinds is closed: every component type used in the
//! world must be registered up front in a [`ComponentRegistry`]. Registration
//! produces a [`ComponentTypeId`] that keys the type-erased per-entity
//! component maps and drives query matching.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can be stored as components.
///
/// Any `'static` type qualifies; the registry decides which ones the world
/// actually accepts.
pub trait Component: Any {}

impl<T: Any> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
    /// `std::any::type_name::<T>()`, kept for diagnostics.
    pub type_name: &'static str,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
#[derive(Debug)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Names already taken.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Register a component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored. A `name` taken
    /// by a different type is [`EcsError::DuplicateComponent`].
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateComponent {
                name: name.to_owned(),
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            type_id: rust_type_id,
            type_name: std::any::type_name::<T>(),
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.lookup_type_id(TypeId::of::<T>())
    }

    /// Look up a component type by a raw Rust `TypeId`.
    pub fn lookup_type_id(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// The registered name of a component type, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id)
            .map(|info| info.name.as_str())
            .unwrap_or("<unregistered>")
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Health(u32);

    #[derive(Debug, Clone)]
    struct Sight {
        radius: f64,
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Health>("health").unwrap();
        assert_eq!(reg.lookup::<Health>(), Some(id));
        assert_eq!(reg.lookup_type_id(TypeId::of::<Health>()), Some(id));
        assert_eq!(reg.lookup::<Sight>(), None);
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = reg.register::<Health>("health").unwrap();
        let id2 = reg.register::<Health>("health_again").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn different_types_different_ids() {
        let mut reg = ComponentRegistry::new();
        let h = reg.register::<Health>("health").unwrap();
        let s = reg.register::<Sight>("sight").unwrap();
        assert_ne!(h, s);
        assert_eq!((reg.name_of(h), reg.name_of(s)), ("health", "sight"));
    }

    #[test]
    fn name_collision_is_rejected() {
        let mut reg = ComponentRegistry::new();
        let health = reg.register::<Health>("stat").unwrap();
        assert_eq!(
            reg.register::<Sight>("stat"),
            Err(EcsError::DuplicateComponent {
                name: "stat".into()
            })
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup::<Sight>(), None);
        assert_eq!(reg.name_of(health), "stat");

        // The failed name stays free for the type that owns it.
        assert_eq!(reg.register::<Health>("stat"), Ok(health));
    }

    #[test]
    fn info_correctness() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Sight>("sight").unwrap();
        let info = reg.get_info(id).unwrap();
        assert_eq!(info.name, "sight");
        assert_eq!(info.type_id, TypeId::of::<Sight>());
        assert!(info.type_name.ends_with("Sight"));
        assert_eq!(reg.name_of(id), "sight");
    }
}

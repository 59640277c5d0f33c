//! Delve ECS -- entity store, spatial index, and synchronous event bus.
//!
//! Entities are opaque ids carrying a set of type-erased components and
//! exactly one grid [`Position`](spatial::Position). The [`World`](world::World)
//! keeps the component store and the position index consistent; the
//! [`EventBus`](event::EventBus) routes events to subscribed systems with
//! depth-first nested dispatch.
//!
//! # Quick Start
//!
//! ```
//! use delve_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Health(u32);
//!
//! let mut world = World::new();
//! world.register_component::<Health>("health").unwrap();
//!
//! let bat = world
//!     .spawn(Position::new(2, 3), ComponentBundle::new().with(Health(4)))
//!     .unwrap();
//!
//! assert_eq!(world.get_component::<Health>(bat), Some(&Health(4)));
//! assert_eq!(world.entities_at(Position::new(2, 3)).collect::<Vec<_>>(), vec![bat]);
//!
//! world.despawn(bat).unwrap();
//! assert!(world.spatial().is_empty());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod event;
pub mod query;
pub mod spatial;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity is not alive (never created, or already removed).
    #[error("entity {0} does not exist")]
    UnknownEntity(entity::EntityId),

    /// A caller-supplied identifier collides with a live entity.
    #[error("entity {0} already exists")]
    DuplicateIdentifier(entity::EntityId),

    /// The component type is unregistered, or absent on the entity.
    #[error("component '{name}' is not registered or not present on the entity")]
    UnknownComponent { name: String },

    /// A single-entity query matched nothing.
    #[error("no entity has component '{component}'")]
    NotFound { component: String },

    /// A component name is already taken by a different type.
    #[error("component name '{name}' is already registered for a different type")]
    DuplicateComponent { name: String },

    /// The system id does not refer to a registered system.
    #[error("{0} is not registered with the event bus")]
    UnknownSystem(event::SystemId),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::event::{Dispatch, Event, EventBus, System, SystemId};
    pub use crate::query::{Query, QueryItem, QueryIter};
    pub use crate::spatial::{Position, SpatialIndex};
    pub use crate::world::{ComponentBundle, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

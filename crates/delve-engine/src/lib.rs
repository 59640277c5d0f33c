//! Delve Engine -- the runtime that ties entities, terrain and events together.
//!
//! This crate builds on [`delve_ecs`] and [`delve_map`]: a [`Runtime`](runtime::Runtime)
//! owns the entity [`World`](delve_ecs::world::World), the tile
//! [`Grid`](delve_map::grid::Grid), an [`EventBus`](delve_ecs::event::EventBus)
//! and a seeded RNG, and serves as the context every system receives.
//!
//! # Quick Start
//!
//! ```
//! use delve_engine::prelude::*;
//!
//! #[derive(Debug)]
//! enum Turn {
//!     Begin,
//! }
//!
//! impl Event for Turn {
//!     type Kind = ();
//!     fn kind(&self) {}
//! }
//!
//! use std::cell::Cell;
//!
//! struct Counter(Cell<u32>);
//!
//! impl System<Runtime<Turn>, Turn> for Counter {
//!     fn process(&self, _rt: &mut Runtime<Turn>, _event: &Turn) -> Result<(), EngineError> {
//!         self.0.set(self.0.get() + 1);
//!         Ok(())
//!     }
//! }
//!
//! let mut runtime: Runtime<Turn> = Runtime::new(RuntimeConfig::default()).unwrap();
//! runtime.generate_level().unwrap();
//!
//! let counter = runtime.event_bus().add_system(Counter(Cell::new(0)));
//! runtime.event_bus().subscribe(counter, [()]).unwrap();
//! runtime.emit(&Turn::Begin).unwrap();
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod runtime;

use delve_ecs::EcsError;
use delve_map::MapError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use delve_ecs;

/// Re-export the map crate for convenience.
pub use delve_map;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the runtime and by systems running inside it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An entity, component or system operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A grid, graph or generation operation failed.
    #[error(transparent)]
    Map(#[from] MapError),

    /// A configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS and map preludes.
    pub use delve_ecs::prelude::*;
    pub use delve_map::prelude::*;

    // Engine-specific exports.
    pub use crate::config::RuntimeConfig;
    pub use crate::runtime::Runtime;
    pub use crate::EngineError;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use delve_ecs::entity::EntityId;

    #[test]
    fn error_display_passes_through() {
        let ecs: EngineError = EcsError::UnknownEntity(EntityId::from_raw(4)).into();
        assert_eq!(ecs.to_string(), "entity #4 does not exist");

        let map: EngineError = MapError::InvalidConfig("bad".into()).into();
        assert_eq!(map.to_string(), "invalid configuration: bad");
    }

    #[test]
    fn json_errors_convert() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let engine: EngineError = err.into();
        assert!(engine.to_string().starts_with("malformed configuration"));
    }
}

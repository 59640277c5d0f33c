//! Runtime configuration.
//!
//! Everything a level depends on lives in [`RuntimeConfig`]: grid size, the
//! RNG seed, generation tunables, the tile property table, and the movement
//! deltas used for pathfinding. All fields have defaults, so a JSON document
//! only needs to name what it overrides.
//!
//! ```
//! use delve_engine::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "seed": 7, "width": 48 }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.width, 48);
//! assert_eq!(config.height, 32);
//! ```

use serde::{Deserialize, Serialize};

use delve_map::prelude::{DeltaCosts, GenerationConfig, MapError, TileTable};

use crate::EngineError;

/// Configuration for a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Grid width in cells. Must be positive.
    pub width: i32,
    /// Grid height in cells. Must be positive.
    pub height: i32,
    /// Seed for the runtime's RNG. The same seed regenerates the same levels.
    pub seed: u64,
    /// Dungeon generation tunables.
    pub generation: GenerationConfig,
    /// Collision, sight and weight per tile kind.
    pub tiles: TileTable,
    /// Steps available to pathfinding, with their cost multipliers.
    pub movement: DeltaCosts,
}

impl Default for RuntimeConfig {
    /// A 32x32 level, seed 0, cardinal movement.
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            seed: 0,
            generation: GenerationConfig::default(),
            tiles: TileTable::default(),
            movement: DeltaCosts::cardinal(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(MapError::InvalidConfig(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            ))
            .into());
        }
        self.generation.validate()?;
        self.tiles.validate()?;
        self.movement.validate()?;
        Ok(())
    }
}

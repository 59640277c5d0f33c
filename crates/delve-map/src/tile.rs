//! Terrain kinds and their externally configured properties.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MapError;

/// A terrain kind. What each kind *does* lives in a [`TileTable`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    /// Open ground.
    Floor,
    /// Solid rock.
    #[default]
    Wall,
    /// Passable but opaque.
    Door,
}

impl Tile {
    /// Every tile kind, in declaration order.
    pub const ALL: [Tile; 3] = [Tile::Floor, Tile::Wall, Tile::Door];

    /// Single-character glyph used by text rendering.
    pub fn glyph(self) -> char {
        match self {
            Tile::Floor => '.',
            Tile::Wall => '#',
            Tile::Door => '+',
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tile::Floor => "floor",
            Tile::Wall => "wall",
            Tile::Door => "door",
        };
        f.write_str(name)
    }
}

/// Derived predicates of one tile kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileProps {
    /// Entities cannot stand here.
    #[serde(default)]
    pub collider: bool,
    /// Blocks line of sight.
    #[serde(default)]
    pub blocks_los: bool,
    /// Movement weight used when building cost graphs.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl TileProps {
    /// Impassable, opaque. Used for kinds missing from a table.
    ///
    /// The weight stays finite so the table survives a JSON round trip;
    /// colliders become impassable when weights are derived from the table.
    pub const SOLID: TileProps = TileProps {
        collider: true,
        blocks_los: true,
        weight: 1.0,
    };
}

/// Tile kind -> properties. Authored as JSON, e.g.
///
/// ```json
/// { "floor": { "weight": 1.0 }, "wall": { "collider": true, "blocks_los": true } }
/// ```
///
/// Kinds without an entry behave as [`TileProps::SOLID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileTable {
    tiles: BTreeMap<Tile, TileProps>,
}

impl Default for TileTable {
    fn default() -> Self {
        let tiles = BTreeMap::from([
            (
                Tile::Floor,
                TileProps {
                    collider: false,
                    blocks_los: false,
                    weight: 1.0,
                },
            ),
            (Tile::Wall, TileProps::SOLID),
            (
                Tile::Door,
                TileProps {
                    collider: false,
                    blocks_los: true,
                    weight: 1.0,
                },
            ),
        ]);
        Self { tiles }
    }
}

impl TileTable {
    /// Parse and validate a table from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        let table: TileTable = serde_json::from_str(json)
            .map_err(|e| MapError::InvalidConfig(format!("tile table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    /// Weights must be non-negative; NaN is rejected.
    pub fn validate(&self) -> Result<(), MapError> {
        for (tile, props) in &self.tiles {
            if props.weight.is_nan() || props.weight < 0.0 {
                return Err(MapError::InvalidConfig(format!(
                    "tile '{tile}' has invalid weight {}",
                    props.weight
                )));
            }
        }
        Ok(())
    }

    /// Properties of `tile`.
    pub fn props(&self, tile: Tile) -> TileProps {
        self.tiles.get(&tile).copied().unwrap_or(TileProps::SOLID)
    }

    /// Replace the properties of one kind.
    pub fn set(&mut self, tile: Tile, props: TileProps) {
        self.tiles.insert(tile, props);
    }

    pub fn is_collider(&self, tile: Tile) -> bool {
        self.props(tile).collider
    }

    pub fn blocks_los(&self, tile: Tile) -> bool {
        self.props(tile).blocks_los
    }

    pub fn weight(&self, tile: Tile) -> f64 {
        self.props(tile).weight
    }
}

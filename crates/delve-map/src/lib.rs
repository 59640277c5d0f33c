//! Delve map -- tile grid, movement graphs, A*, dungeon generation, and
//! visibility.
//!
//! A [`Grid`](grid::Grid) stores [`Tile`](tile::Tile)s whose behaviour
//! (collision, sight blocking, movement weight) comes from an external
//! [`TileTable`](tile::TileTable). Movement graphs are derived from the grid
//! on demand and cached until the next write.
//!
//! ```
//! use delve_map::prelude::*;
//!
//! let mut grid = Grid::new(5, 5, Tile::Floor).unwrap();
//! grid.fill_rect(Rect::new(Position::new(2, 0), Position::new(2, 3)), Tile::Wall).unwrap();
//!
//! let weights = TileWeights::from_table(&TileTable::default());
//! let graph = grid.graph(&weights, &DeltaCosts::cardinal()).unwrap();
//! let path = shortest_path(graph, Position::new(0, 0), Position::new(4, 0), manhattan)
//!     .unwrap()
//!     .expect("route around the wall");
//! assert_eq!(path.cost, 12.0);
//! ```

pub mod dungeon;
pub mod geometry;
pub mod graph;
pub mod grid;
pub mod pathfind;
pub mod tile;
pub mod visibility;

use std::fmt;

pub use delve_ecs::spatial::Position;

/// Errors produced by grid, graph, and generation operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// A position outside the grid was read, written, or used as an endpoint.
    #[error("position {position} is outside the {width}x{height} grid")]
    OutOfBounds {
        position: Position,
        width: i32,
        height: i32,
    },

    /// A graph operation referenced a node that was never added.
    #[error("node {node} is not in the graph")]
    UnknownNode { node: String },

    /// Sampling found no cell of the requested kind.
    #[error("no cell holds tile '{tile}'")]
    EmptyResult { tile: tile::Tile },

    /// A table or generation parameter is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MapError {
    pub(crate) fn unknown_node(node: impl fmt::Debug) -> Self {
        MapError::UnknownNode {
            node: format!("{node:?}"),
        }
    }
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::dungeon::{DungeonGenerator, GenerationConfig, GenerationReport};
    pub use crate::geometry::{are_adjacent, chebyshev, euclidean, manhattan, zero, Delta, Rect};
    pub use crate::graph::{DeltaCosts, Edge, Graph, GraphBuilder, TileWeights};
    pub use crate::grid::Grid;
    pub use crate::pathfind::{pathfind, shortest_path, trace_path, Path, SearchResult};
    pub use crate::tile::{Tile, TileProps, TileTable};
    pub use crate::visibility::{line, RadiusIter};
    pub use crate::MapError;
    pub use delve_ecs::spatial::Position;
}

//! Stochastic room placement with corridors that keep every room connected.
//!
//! Generation runs in two phases:
//!
//! 1. **Rooms.** The grid is reset to walls. Each attempt samples a corner
//!    from a pool of still-unclaimed interior cells and a random size. A room
//!    is accepted if its 1-cell margin stays on the grid and does not touch
//!    the margin of any accepted room; the margin is then removed from the
//!    pool. Accepted rooms are carved as floor.
//! 2. **Corridors.** Consecutive rooms (in acceptance order) are joined by an
//!    A* path between their centres over a graph where walls cost a large but
//!    finite weight. Because no edge is infinite a path always exists, so the
//!    carved floor forms one connected region.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use delve_ecs::spatial::Position;

use crate::geometry::{manhattan, Rect};
use crate::graph::{DeltaCosts, TileWeights};
use crate::grid::Grid;
use crate::pathfind::{pathfind, trace_path};
use crate::tile::Tile;
use crate::MapError;

/// Tunables for [`DungeonGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Room placement attempts. Bounds attempts, not rooms.
    pub iterations: usize,
    /// Smallest room side, in cells.
    pub min_room_size: i32,
    /// Largest room side, in cells.
    pub max_room_size: i32,
    /// Cost of carving through one wall cell when routing corridors.
    pub wall_weight: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            min_room_size: 1,
            max_room_size: 5,
            wall_weight: 10_000.0,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), MapError> {
        if self.min_room_size < 1 {
            return Err(MapError::InvalidConfig(format!(
                "min_room_size must be at least 1, got {}",
                self.min_room_size
            )));
        }
        if self.min_room_size > self.max_room_size {
            return Err(MapError::InvalidConfig(format!(
                "min_room_size {} exceeds max_room_size {}",
                self.min_room_size, self.max_room_size
            )));
        }
        if !self.wall_weight.is_finite() || self.wall_weight <= 0.0 {
            return Err(MapError::InvalidConfig(format!(
                "wall_weight must be finite and positive, got {}",
                self.wall_weight
            )));
        }
        Ok(())
    }
}

/// What a generation run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Accepted rooms, in acceptance order.
    pub rooms: Vec<Rect>,
    /// Placement attempts actually made (fewer than configured if the pool
    /// ran dry).
    pub attempts: usize,
    /// Number of floor cells after carving.
    pub floor_cells: usize,
}

// ---------------------------------------------------------------------------
// CellPool
// ---------------------------------------------------------------------------

/// Set of cells with O(1) removal and uniform sampling.
#[derive(Debug, Default)]
struct CellPool {
    cells: Vec<Position>,
    slots: HashMap<Position, usize>,
}

impl CellPool {
    fn from_cells(cells: impl IntoIterator<Item = Position>) -> Self {
        let mut pool = Self::default();
        for cell in cells {
            pool.slots.insert(cell, pool.cells.len());
            pool.cells.push(cell);
        }
        pool
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn remove(&mut self, cell: Position) {
        let Some(slot) = self.slots.remove(&cell) else {
            return;
        };
        self.cells.swap_remove(slot);
        if let Some(&moved) = self.cells.get(slot) {
            self.slots.insert(moved, slot);
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        if self.is_empty() {
            return None;
        }
        Some(self.cells[rng.gen_range(0..self.cells.len())])
    }
}

// ---------------------------------------------------------------------------
// DungeonGenerator
// ---------------------------------------------------------------------------

/// Carves connected rooms into a [`Grid`].
#[derive(Debug, Clone)]
pub struct DungeonGenerator {
    config: GenerationConfig,
}

impl DungeonGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, MapError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Overwrite `grid` with a freshly generated level.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Result<GenerationReport, MapError> {
        grid.fill_rect(grid.bounds(), Tile::Wall)?;

        let (rooms, attempts) = self.place_rooms(grid, rng);
        for room in &rooms {
            grid.fill_rect(*room, Tile::Floor)?;
        }
        self.connect_rooms(grid, &rooms)?;

        let floor_cells = grid.count_of(Tile::Floor);
        info!(
            rooms = rooms.len(),
            attempts,
            floor_cells,
            width = grid.width(),
            height = grid.height(),
            "dungeon generated"
        );
        Ok(GenerationReport {
            rooms,
            attempts,
            floor_cells,
        })
    }

    fn place_rooms<R: Rng + ?Sized>(&self, grid: &Grid, rng: &mut R) -> (Vec<Rect>, usize) {
        let interior = grid.bounds().grow(-1);
        let mut pool = if interior.width() > 0 && interior.height() > 0 {
            CellPool::from_cells(interior.cells())
        } else {
            CellPool::default()
        };
        debug!(cells = pool.len(), "room placement pool");

        let GenerationConfig {
            iterations,
            min_room_size,
            max_room_size,
            ..
        } = self.config;

        let mut rooms: Vec<Rect> = Vec::new();
        let mut attempts = 0;
        for _ in 0..iterations {
            let Some(corner) = pool.sample(rng) else {
                debug!(attempts, "placement pool exhausted");
                break;
            };
            attempts += 1;
            let height = rng.gen_range(min_room_size..=max_room_size);
            let width = rng.gen_range(min_room_size..=max_room_size);
            let room = Rect::from_corner(corner, width, height);
            let margin = room.grow(1);

            if !grid.contains_rect(&margin) {
                continue;
            }
            if rooms.iter().any(|other| other.grow(1).intersects(&margin)) {
                continue;
            }
            for cell in margin.cells() {
                pool.remove(cell);
            }
            rooms.push(room);
        }
        (rooms, attempts)
    }

    fn connect_rooms(&self, grid: &mut Grid, rooms: &[Rect]) -> Result<(), MapError> {
        let weights = TileWeights::uniform(1.0).with(Tile::Wall, self.config.wall_weight);
        let deltas = DeltaCosts::cardinal();

        for (i, pair) in rooms.windows(2).enumerate() {
            let (from, to) = (pair[0].center(), pair[1].center());
            let path = {
                let graph = grid.graph(&weights, &deltas)?;
                let search = pathfind(graph, from, Some(to), manhattan)?;
                trace_path(&search.predecessors, to)
            };
            grid.trace_path(&path, Tile::Floor)?;
            if i % 10 == 0 {
                debug!(done = i, total = rooms.len() - 1, "corridors");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn pool_remove_and_sample() {
        let cells: Vec<Position> = (0..5).map(|x| Position::new(x, 0)).collect();
        let mut pool = CellPool::from_cells(cells);
        pool.remove(Position::new(0, 0));
        pool.remove(Position::new(0, 0));
        pool.remove(Position::new(4, 0));
        assert_eq!(pool.len(), 3);

        let mut rng = Pcg64::seed_from_u64(1);
        for _ in 0..50 {
            let cell = pool.sample(&mut rng).unwrap();
            assert!((1..=3).contains(&cell.x));
        }
        for x in 1..=3 {
            pool.remove(Position::new(x, 0));
        }
        assert!(pool.is_empty());
        assert_eq!(pool.sample(&mut rng), None);
    }

    #[test]
    fn config_validation() {
        assert!(GenerationConfig::default().validate().is_ok());
        let bad = [
            GenerationConfig {
                min_room_size: 0,
                ..Default::default()
            },
            GenerationConfig {
                min_room_size: 6,
                max_room_size: 5,
                ..Default::default()
            },
            GenerationConfig {
                wall_weight: f64::INFINITY,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(DungeonGenerator::new(config).is_err());
        }
    }

    #[test]
    fn zero_iterations_leave_solid_rock() {
        let mut grid = Grid::new(12, 12, Tile::Floor).unwrap();
        let generator = DungeonGenerator::new(GenerationConfig {
            iterations: 0,
            ..Default::default()
        })
        .unwrap();
        let report = generator
            .generate(&mut grid, &mut Pcg64::seed_from_u64(3))
            .unwrap();
        assert!(report.rooms.is_empty());
        assert_eq!(grid.count_of(Tile::Wall), 144);
    }

    #[test]
    fn tiny_grid_has_no_interior() {
        let mut grid = Grid::new(2, 2, Tile::Floor).unwrap();
        let generator = DungeonGenerator::new(GenerationConfig::default()).unwrap();
        let report = generator
            .generate(&mut grid, &mut Pcg64::seed_from_u64(3))
            .unwrap();
        assert_eq!(report.attempts, 0);
        assert_eq!(report.floor_cells, 0);
    }

    #[test]
    fn rooms_stay_off_the_border() {
        let mut grid = Grid::new(24, 16, Tile::Floor).unwrap();
        let generator = DungeonGenerator::new(GenerationConfig::default()).unwrap();
        let report = generator
            .generate(&mut grid, &mut Pcg64::seed_from_u64(11))
            .unwrap();
        assert!(!report.rooms.is_empty());
        for room in &report.rooms {
            assert!(grid.contains_rect(&room.grow(1)));
            assert!(room.cells().all(|c| grid.get(c) == Ok(Tile::Floor)));
        }
        for x in 0..24 {
            assert_eq!(grid.get(Position::new(x, 0)), Ok(Tile::Wall));
            assert_eq!(grid.get(Position::new(x, 15)), Ok(Tile::Wall));
        }
    }
}

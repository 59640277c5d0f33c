//! The runtime: one world, one grid, one event bus, one seeded RNG.
//!
//! [`Runtime`] is the context systems receive. It implements
//! [`Dispatch`], so a system can mutate the world or grid and then
//! [`emit`](Dispatch::emit) follow-up events; those are delivered before
//! the emitting call returns.
//!
//! # Example
//!
//! ```
//! use delve_engine::prelude::*;
//!
//! #[derive(Debug)]
//! struct Tick;
//!
//! impl Event for Tick {
//!     type Kind = ();
//!     fn kind(&self) {}
//! }
//!
//! struct Marker;
//!
//! let mut runtime: Runtime<Tick> = Runtime::new(RuntimeConfig { seed: 3, ..Default::default() }).unwrap();
//! runtime.world_mut().register_component::<Marker>("marker").unwrap();
//! let report = runtime.generate_level().unwrap();
//! assert!(!report.rooms.is_empty());
//!
//! let entity = runtime
//!     .spawn_on_random_floor(ComponentBundle::new().with(Marker))
//!     .unwrap();
//! let position = runtime.world().position_of(entity).unwrap();
//! assert!(runtime.is_walkable(position));
//! assert_eq!(runtime.fingerprint().len(), 64);
//! ```

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tracing::{debug, info};

use delve_ecs::prelude::*;
use delve_map::prelude::*;

use crate::config::RuntimeConfig;
use crate::EngineError;

/// World, grid and event bus driven by a seeded RNG.
pub struct Runtime<E: Event + 'static> {
    world: World,
    grid: Grid,
    bus: EventBus<Runtime<E>, E>,
    rng: Pcg64,
    generator: DungeonGenerator,
    weights: TileWeights,
    /// Lower bound on the cost of a single step.
    cheapest_step: f64,
    config: RuntimeConfig,
    /// Levels generated so far.
    level: u32,
}

impl<E: Event + 'static> Dispatch<E> for Runtime<E> {
    type Error = EngineError;

    fn event_bus(&mut self) -> &mut EventBus<Self, E> {
        &mut self.bus
    }
}

impl<E: Event + 'static> Runtime<E> {
    /// Build a runtime with a solid grid and no systems.
    ///
    /// Call [`generate_level`](Self::generate_level) to carve the first
    /// level.
    pub fn new(config: RuntimeConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let grid = Grid::new(config.width, config.height, Tile::Wall)?;
        let generator = DungeonGenerator::new(config.generation.clone())?;
        let weights = TileWeights::from_table(&config.tiles);
        let cheapest_step = cheapest_step(&weights, &config.movement);
        info!(
            width = config.width,
            height = config.height,
            seed = config.seed,
            "runtime created"
        );
        Ok(Self {
            world: World::new(),
            grid,
            bus: EventBus::new(),
            rng: Pcg64::seed_from_u64(config.seed),
            generator,
            weights,
            cheapest_step,
            config,
            level: 0,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable grid. Writes drop the cached movement graph.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// The runtime's RNG. Draw from it, and only it, to keep runs
    /// reproducible from the seed.
    pub fn rng(&mut self) -> &mut Pcg64 {
        &mut self.rng
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of levels generated so far.
    pub fn level(&self) -> u32 {
        self.level
    }

    // -- level lifecycle ----------------------------------------------------

    /// Despawn every entity.
    ///
    /// Identifiers are collected first, then removed.
    pub fn clear_entities(&mut self) -> Result<usize, EngineError> {
        let entities: Vec<EntityId> = self.world.entities().collect();
        for &entity in &entities {
            self.world.despawn(entity)?;
        }
        debug!(count = entities.len(), "entities cleared");
        Ok(entities.len())
    }

    /// Clear all entities and carve a fresh level into the grid.
    pub fn generate_level(&mut self) -> Result<GenerationReport, EngineError> {
        self.clear_entities()?;
        let report = self.generator.generate(&mut self.grid, &mut self.rng)?;
        self.level += 1;
        info!(
            level = self.level,
            rooms = report.rooms.len(),
            floor_cells = report.floor_cells,
            "level ready"
        );
        Ok(report)
    }

    /// Spawn an entity on a uniformly chosen floor cell no other entity
    /// occupies.
    ///
    /// Fails with [`MapError::EmptyResult`] when every floor cell is taken
    /// or there is no floor.
    pub fn spawn_on_random_floor(
        &mut self,
        bundle: ComponentBundle,
    ) -> Result<EntityId, EngineError> {
        let free: Vec<Position> = self
            .grid
            .cells_of(Tile::Floor)
            .filter(|&cell| self.world.spatial().count_at(cell) == 0)
            .collect();
        let cell = *free
            .choose(&mut self.rng)
            .ok_or(MapError::EmptyResult { tile: Tile::Floor })?;
        Ok(self.world.spawn(cell, bundle)?)
    }

    // -- terrain queries ----------------------------------------------------

    /// In bounds and not a collider.
    pub fn is_walkable(&self, position: Position) -> bool {
        self.grid
            .get(position)
            .is_ok_and(|tile| !self.config.tiles.is_collider(tile))
    }

    /// Cheapest route between two cells under the configured tile table and
    /// movement deltas, or `None` if `to` is unreachable. Either endpoint
    /// off the grid is [`MapError::OutOfBounds`].
    ///
    /// The heuristic is Chebyshev distance times the cheapest possible step,
    /// which never overestimates as long as every delta moves at most one
    /// cell per axis.
    pub fn path_between(
        &mut self,
        from: Position,
        to: Position,
    ) -> Result<Option<Path<Position>>, EngineError> {
        for endpoint in [from, to] {
            if !self.grid.in_bounds(endpoint) {
                return Err(self.grid.out_of_bounds(endpoint).into());
            }
        }
        let scale = self.cheapest_step;
        let graph = self.grid.graph(&self.weights, &self.config.movement)?;
        Ok(shortest_path(graph, from, to, |a, b| scale * chebyshev(a, b))?)
    }

    /// Whether `to` can be seen from `from`.
    pub fn can_see(&self, from: Position, to: Position) -> Result<bool, EngineError> {
        Ok(self.grid.in_los(&self.config.tiles, from, to)?)
    }

    /// Cells within `radius` of `origin` that are in line of sight.
    pub fn visible_from(
        &self,
        origin: Position,
        radius: f64,
    ) -> Result<Vec<Position>, EngineError> {
        Ok(self.grid.visible_cells(&self.config.tiles, origin, radius)?)
    }

    // -- hashing ------------------------------------------------------------

    /// BLAKE3 hex digest of the level: grid size, every tile, and every
    /// entity's identifier and position.
    ///
    /// Two runtimes built from the same config and driven the same way
    /// produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.grid.width().to_le_bytes());
        hasher.update(&self.grid.height().to_le_bytes());
        let glyphs: String = self.grid.tiles().iter().map(|tile| tile.glyph()).collect();
        hasher.update(glyphs.as_bytes());
        for entity in self.world.entities() {
            hasher.update(&entity.to_raw().to_le_bytes());
            if let Ok(position) = self.world.position_of(entity) {
                hasher.update(&position.x.to_le_bytes());
                hasher.update(&position.y.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Smallest finite tile weight times smallest delta cost; 0 if either table
/// has no finite entry.
fn cheapest_step(weights: &TileWeights, deltas: &DeltaCosts) -> f64 {
    let weight = Tile::ALL
        .iter()
        .map(|&tile| weights.get(tile))
        .filter(|w| w.is_finite())
        .fold(f64::INFINITY, f64::min);
    let cost = deltas.iter().map(|(_, c)| c).fold(f64::INFINITY, f64::min);
    let step = weight * cost;
    if step.is_finite() {
        step
    } else {
        0.0
    }
}

impl<E: Event + 'static> std::fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("level", &self.level)
            .field("entities", &self.world.entity_count())
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("bus", &self.bus)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

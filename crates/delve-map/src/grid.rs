//! The tile grid: a row-major array of [`Tile`]s with a lazily built,
//! write-invalidated movement graph.

use std::fmt;

use rand::Rng;
use tracing::debug;

use delve_ecs::spatial::Position;

use crate::geometry::Rect;
use crate::graph::{DeltaCosts, Graph, GraphBuilder, TileWeights};
use crate::tile::Tile;
use crate::MapError;

/// The cached graph together with the tables it was built from.
#[derive(Debug, Clone)]
struct GraphCache {
    weights: TileWeights,
    deltas: DeltaCosts,
    graph: Graph<Position>,
}

/// Rectangular tile map.
///
/// Every write goes through a method that drops the cached graph, so
/// [`graph`](Grid::graph) never returns a graph built from stale tiles.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    cache: Option<GraphCache>,
}

impl Grid {
    /// A `width` x `height` grid filled with `fill`.
    pub fn new(width: i32, height: i32, fill: Tile) -> Result<Self, MapError> {
        if width <= 0 || height <= 0 {
            return Err(MapError::InvalidConfig(format!(
                "grid dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            tiles: vec![fill; (width as usize) * (height as usize)],
            cache: None,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// The rectangle covering the whole grid.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            Position::new(0, 0),
            Position::new(self.width - 1, self.height - 1),
        )
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        (0..self.width).contains(&position.x) && (0..self.height).contains(&position.y)
    }

    /// Whether every cell of `rect` is in bounds.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        self.in_bounds(rect.min) && self.in_bounds(rect.max)
    }

    fn index(&self, position: Position) -> Result<usize, MapError> {
        if !self.in_bounds(position) {
            return Err(self.out_of_bounds(position));
        }
        Ok((position.y as usize) * (self.width as usize) + position.x as usize)
    }

    /// The [`MapError::OutOfBounds`] for `position` on this grid.
    pub fn out_of_bounds(&self, position: Position) -> MapError {
        MapError::OutOfBounds {
            position,
            width: self.width,
            height: self.height,
        }
    }

    /// Tile at `position`.
    pub fn get(&self, position: Position) -> Result<Tile, MapError> {
        Ok(self.tiles[self.index(position)?])
    }

    /// Overwrite one cell.
    pub fn set(&mut self, position: Position, tile: Tile) -> Result<(), MapError> {
        let index = self.index(position)?;
        self.invalidate();
        self.tiles[index] = tile;
        Ok(())
    }

    /// Stamp `tile` onto every cell of `rect`. Nothing is written if any part
    /// of the rectangle is out of bounds.
    pub fn fill_rect(&mut self, rect: Rect, tile: Tile) -> Result<(), MapError> {
        if !self.in_bounds(rect.min) {
            return Err(self.out_of_bounds(rect.min));
        }
        if !self.in_bounds(rect.max) {
            return Err(self.out_of_bounds(rect.max));
        }
        self.invalidate();
        for cell in rect.cells() {
            let index = self.index(cell)?;
            self.tiles[index] = tile;
        }
        Ok(())
    }

    /// Stamp `tile` onto every cell of `path`. Nothing is written if any cell
    /// is out of bounds.
    pub fn trace_path(&mut self, path: &[Position], tile: Tile) -> Result<(), MapError> {
        if let Some(&bad) = path.iter().find(|&&p| !self.in_bounds(p)) {
            return Err(self.out_of_bounds(bad));
        }
        self.invalidate();
        for &cell in path {
            let index = self.index(cell)?;
            self.tiles[index] = tile;
        }
        Ok(())
    }

    /// Cells holding `tile`, row by row.
    pub fn cells_of(&self, tile: Tile) -> impl Iterator<Item = Position> + '_ {
        self.bounds()
            .cells()
            .zip(self.tiles.iter())
            .filter(move |(_, &t)| t == tile)
            .map(|(cell, _)| cell)
    }

    pub fn count_of(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == tile).count()
    }

    /// A uniformly chosen cell holding `tile`.
    ///
    /// Fails with [`MapError::EmptyResult`] when no cell does.
    pub fn random_cell_of<R: Rng + ?Sized>(
        &self,
        tile: Tile,
        rng: &mut R,
    ) -> Result<Position, MapError> {
        let count = self.count_of(tile);
        if count == 0 {
            return Err(MapError::EmptyResult { tile });
        }
        let pick = rng.gen_range(0..count);
        self.cells_of(tile)
            .nth(pick)
            .ok_or(MapError::EmptyResult { tile })
    }

    /// A uniformly chosen floor cell.
    pub fn random_empty_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Position, MapError> {
        self.random_cell_of(Tile::Floor, rng)
    }

    /// Row-major tile slice.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The movement graph for the current tiles.
    ///
    /// Built on first use and after any write; also rebuilt when called with
    /// tables different from the ones the cached graph was built with.
    pub fn graph(
        &mut self,
        weights: &TileWeights,
        deltas: &DeltaCosts,
    ) -> Result<&Graph<Position>, MapError> {
        let cache = match self.cache.take() {
            Some(cache) if cache.weights == *weights && cache.deltas == *deltas => cache,
            _ => {
                debug!(width = self.width, height = self.height, "rebuilding grid graph");
                GraphCache {
                    graph: GraphBuilder::build(self, weights, deltas)?,
                    weights: weights.clone(),
                    deltas: deltas.clone(),
                }
            }
        };
        Ok(&self.cache.insert(cache).graph)
    }

    /// Whether a graph is cached.
    pub fn has_cached_graph(&self) -> bool {
        self.cache.is_some()
    }

    /// Drop the cached graph.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}

impl fmt::Display for Grid {
    /// One glyph per cell, one line per row.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.tiles.chunks(self.width as usize).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for tile in row {
                write!(f, "{}", tile.glyph())?;
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

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn bounds_checks_fail_loudly() {
        let mut grid = Grid::new(4, 3, Tile::Floor).unwrap();
        assert!(grid.in_bounds(p(3, 2)));
        assert!(!grid.in_bounds(p(4, 0)));
        assert!(!grid.in_bounds(p(0, -1)));
        assert_eq!(
            grid.get(p(4, 0)),
            Err(MapError::OutOfBounds {
                position: p(4, 0),
                width: 4,
                height: 3
            })
        );
        assert!(grid.set(p(-1, 0), Tile::Wall).is_err());
    }

    #[test]
    fn zero_sized_grid_rejected() {
        assert!(matches!(
            Grid::new(0, 5, Tile::Wall),
            Err(MapError::InvalidConfig(_))
        ));
    }

    #[test]
    fn fill_rect_is_all_or_nothing() {
        let mut grid = Grid::new(4, 4, Tile::Wall).unwrap();
        grid.fill_rect(Rect::new(p(1, 1), p(2, 2)), Tile::Floor).unwrap();
        assert_eq!(grid.count_of(Tile::Floor), 4);

        let err = grid.fill_rect(Rect::new(p(2, 2), p(4, 4)), Tile::Door);
        assert!(err.is_err());
        assert_eq!(grid.count_of(Tile::Door), 0);
    }

    #[test]
    fn trace_path_stamps_cells() {
        let mut grid = Grid::new(3, 3, Tile::Wall).unwrap();
        grid.trace_path(&[p(0, 0), p(1, 0), p(1, 1)], Tile::Floor).unwrap();
        assert_eq!(grid.cells_of(Tile::Floor).collect::<Vec<_>>(), vec![p(0, 0), p(1, 0), p(1, 1)]);
        assert!(grid.trace_path(&[p(2, 2), p(3, 3)], Tile::Door).is_err());
        assert_eq!(grid.get(p(2, 2)).unwrap(), Tile::Wall);
    }

    #[test]
    fn random_cell_samples_matching_kind() {
        let mut grid = Grid::new(5, 5, Tile::Wall).unwrap();
        grid.set(p(3, 1), Tile::Floor).unwrap();
        grid.set(p(0, 4), Tile::Floor).unwrap();
        let mut rng = Pcg64::seed_from_u64(7);
        for _ in 0..20 {
            let cell = grid.random_empty_cell(&mut rng).unwrap();
            assert_eq!(grid.get(cell).unwrap(), Tile::Floor);
        }
        assert_eq!(
            grid.random_cell_of(Tile::Door, &mut rng),
            Err(MapError::EmptyResult { tile: Tile::Door })
        );
    }

    #[test]
    fn graph_cache_invalidated_by_writes() {
        let mut grid = Grid::new(3, 1, Tile::Floor).unwrap();
        let weights = TileWeights::uniform(1.0).with(Tile::Wall, 50.0);
        let deltas = DeltaCosts::cardinal();

        let before = grid.graph(&weights, &deltas).unwrap().edges(p(0, 0))[0].weight;
        assert_eq!(before, 1.0);
        assert!(grid.has_cached_graph());

        grid.set(p(1, 0), Tile::Wall).unwrap();
        assert!(!grid.has_cached_graph());
        let after = grid.graph(&weights, &deltas).unwrap().edges(p(0, 0))[0].weight;
        assert_eq!(after, 50.0);
    }

    #[test]
    fn graph_rebuilt_for_different_tables() {
        let mut grid = Grid::new(2, 1, Tile::Floor).unwrap();
        let deltas = DeltaCosts::cardinal();
        let one = grid.graph(&TileWeights::uniform(1.0), &deltas).unwrap().edges(p(0, 0))[0].weight;
        let two = grid.graph(&TileWeights::uniform(2.0), &deltas).unwrap().edges(p(0, 0))[0].weight;
        assert_eq!((one, two), (1.0, 2.0));
    }

    #[test]
    fn display_renders_rows() {
        let mut grid = Grid::new(3, 2, Tile::Wall).unwrap();
        grid.set(p(1, 1), Tile::Floor).unwrap();
        grid.set(p(2, 0), Tile::Door).unwrap();
        assert_eq!(grid.to_string(), "##+\n#.#");
    }
}

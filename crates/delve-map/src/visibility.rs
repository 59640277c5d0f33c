//! Line-of-sight rasterisation and radius flood fill.

use std::collections::HashSet;

use delve_ecs::spatial::Position;

use crate::geometry::{euclidean, Delta};
use crate::grid::Grid;
use crate::tile::TileTable;
use crate::MapError;

/// Integer line from `from` to `to`, both ends included, ordered from `from`.
///
/// Bresenham with dominant-axis selection: x-major lines get exactly one cell
/// per column, y-major lines one per row. Lines are always rasterised in the
/// increasing direction of their major axis and reversed afterwards if
/// needed, so `line(a, b)` and `line(b, a)` cover the same cells.
pub fn line(from: Position, to: Position) -> Vec<Position> {
    let x_major = (to.y - from.y).abs() < (to.x - from.x).abs();
    let flipped = if x_major { from.x > to.x } else { from.y > to.y };
    let (a, b) = if flipped { (to, from) } else { (from, to) };
    let mut cells = if x_major {
        rasterise(a, b, |p| (p.x, p.y), |major, minor| Position::new(major, minor))
    } else {
        rasterise(a, b, |p| (p.y, p.x), |major, minor| Position::new(minor, major))
    };
    if flipped {
        cells.reverse();
    }
    cells
}

/// Bresenham along an increasing major axis. `split` maps a position to
/// `(major, minor)` and `join` maps back.
fn rasterise(
    a: Position,
    b: Position,
    split: impl Fn(Position) -> (i32, i32),
    join: impl Fn(i32, i32) -> Position,
) -> Vec<Position> {
    let (major0, minor0) = split(a);
    let (major1, minor1) = split(b);
    let d_major = major1 - major0;
    let mut d_minor = minor1 - minor0;
    let mut step = 1;
    if d_minor < 0 {
        step = -1;
        d_minor = -d_minor;
    }

    let mut error = 2 * d_minor - d_major;
    let mut minor = minor0;
    let mut cells = Vec::with_capacity(d_major as usize + 1);
    for major in major0..=major1 {
        cells.push(join(major, minor));
        if error > 0 {
            minor += step;
            error += 2 * (d_minor - d_major);
        } else {
            error += 2 * d_minor;
        }
    }
    cells
}

impl Grid {
    /// Whether `destination` is visible from `origin`.
    ///
    /// Every cell of [`line`]`(origin, destination)` except the last is
    /// tested, so the destination's own tile never hides it while the
    /// origin's does. The relation is therefore not symmetric: a wall at `b`
    /// can be seen from `a`, but nothing behind it can be seen from `b`.
    pub fn in_los(
        &self,
        tiles: &TileTable,
        origin: Position,
        destination: Position,
    ) -> Result<bool, MapError> {
        for endpoint in [origin, destination] {
            if !self.in_bounds(endpoint) {
                return Err(self.out_of_bounds(endpoint));
            }
        }
        let cells = line(origin, destination);
        for &cell in &cells[..cells.len() - 1] {
            if tiles.blocks_los(self.get(cell)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Cells within Euclidean `radius` of `origin`, reached by stepping along
    /// `deltas` (cardinal when empty).
    ///
    /// Depth-first, lazy, each cell yielded at most once. Terrain is ignored:
    /// this is a purely geometric fill, combine with [`in_los`](Self::in_los)
    /// for visibility.
    pub fn iterate_radius(
        &self,
        origin: Position,
        radius: f64,
        deltas: &[Delta],
    ) -> Result<RadiusIter<'_>, MapError> {
        if !self.in_bounds(origin) {
            return Err(self.out_of_bounds(origin));
        }
        let deltas = if deltas.is_empty() {
            Delta::CARDINAL.to_vec()
        } else {
            deltas.to_vec()
        };
        Ok(RadiusIter {
            grid: self,
            origin,
            radius,
            deltas,
            stack: vec![origin],
            seen: HashSet::from([origin]),
        })
    }

    /// Cells within `radius` of `origin` (cardinal fill) that are in line of
    /// sight from it.
    pub fn visible_cells(
        &self,
        tiles: &TileTable,
        origin: Position,
        radius: f64,
    ) -> Result<Vec<Position>, MapError> {
        let mut visible = Vec::new();
        for cell in self.iterate_radius(origin, radius, &[])? {
            if self.in_los(tiles, origin, cell)? {
                visible.push(cell);
            }
        }
        Ok(visible)
    }
}

/// Iterator returned by [`Grid::iterate_radius`].
pub struct RadiusIter<'g> {
    grid: &'g Grid,
    origin: Position,
    radius: f64,
    deltas: Vec<Delta>,
    stack: Vec<Position>,
    /// Cells ever pushed.
    seen: HashSet<Position>,
}

impl Iterator for RadiusIter<'_> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        while let Some(current) = self.stack.pop() {
            if euclidean(current, self.origin) > self.radius {
                continue;
            }
            for delta in &self.deltas {
                let next = delta.apply(current);
                if self.grid.in_bounds(next) && self.seen.insert(next) {
                    self.stack.push(next);
                }
            }
            return Some(current);
        }
        None
    }
}

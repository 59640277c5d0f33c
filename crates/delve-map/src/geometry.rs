//! Rectangles, movement deltas, and distance heuristics on grid positions.

use serde::{Deserialize, Serialize};

use delve_ecs::spatial::Position;

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Position,
    pub max: Position,
}

impl Rect {
    /// Rectangle spanning two opposite corners, in any order.
    pub fn new(a: Position, b: Position) -> Self {
        Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Rectangle of `width` x `height` cells whose top-left cell is `corner`.
    /// Sizes below 1 are treated as 1.
    pub fn from_corner(corner: Position, width: i32, height: i32) -> Self {
        Self {
            min: corner,
            max: corner.offset(width.max(1) - 1, height.max(1) - 1),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }

    /// Number of cells covered.
    pub fn area(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    /// Grow (or shrink, for negative `margin`) on every side.
    pub fn grow(&self, margin: i32) -> Self {
        Self {
            min: self.min.offset(-margin, -margin),
            max: self.max.offset(margin, margin),
        }
    }

    /// Whether the two rectangles share at least one cell.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.min.x..=self.max.x).contains(&position.x)
            && (self.min.y..=self.max.y).contains(&position.y)
    }

    /// Center cell, rounding toward the min corner.
    pub fn center(&self) -> Position {
        Position::new(
            (self.min.x + self.max.x).div_euclid(2),
            (self.min.y + self.max.y).div_euclid(2),
        )
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Position> {
        let Rect { min, max } = *self;
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| Position::new(x, y)))
    }
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// A single movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Delta {
    pub dx: i32,
    pub dy: i32,
}

impl Delta {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Down, right, left, up.
    pub const CARDINAL: [Delta; 4] = [
        Delta::new(0, 1),
        Delta::new(1, 0),
        Delta::new(-1, 0),
        Delta::new(0, -1),
    ];

    pub const DIAGONAL: [Delta; 4] = [
        Delta::new(1, 1),
        Delta::new(-1, -1),
        Delta::new(1, -1),
        Delta::new(-1, 1),
    ];

    /// Apply to a position.
    pub fn apply(self, position: Position) -> Position {
        position.offset(self.dx, self.dy)
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// |dx| + |dy|. Admissible for cardinal movement with unit weights.
pub fn manhattan(a: Position, b: Position) -> f64 {
    f64::from((a.x - b.x).abs() + (a.y - b.y).abs())
}

/// max(|dx|, |dy|). Admissible for king moves with unit weights.
pub fn chebyshev(a: Position, b: Position) -> f64 {
    f64::from((a.x - b.x).abs().max((a.y - b.y).abs()))
}

/// Straight-line distance between cell centres.
pub fn euclidean(a: Position, b: Position) -> f64 {
    f64::from(a.x - b.x).hypot(f64::from(a.y - b.y))
}

/// Always 0; turns A* into Dijkstra.
pub fn zero<N>(_: N, _: N) -> f64 {
    0.0
}

/// Whether two cells touch, diagonals included. A cell is adjacent to itself.
pub fn are_adjacent(a: Position, b: Position) -> bool {
    (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1
}

//! Grid positions and the bidirectional position <-> entity index.
//!
//! The [`SpatialIndex`] keeps two maps in lockstep: a forward map from a grid
//! [`Position`] to the set of entities standing there, and a reverse map from
//! each entity to its single position. Buckets that become empty are dropped
//! so that removing every entity restores the index to its initial state.
//!
//! The index never validates bounds or collisions; that is the caller's job.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate on the tile grid.
///
/// `x` grows to the right (columns), `y` grows downward (rows). Coordinates
/// are signed so that neighbour arithmetic can step off the grid and be
/// rejected by a bounds check instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Construct a position from column and row.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position shifted by `(dx, dy)`.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// Bidirectional map between grid positions and entities.
///
/// Invariant: an entity is in the forward bucket at `p` if and only if the
/// reverse map says its position is `p`, and every tracked entity has exactly
/// one position.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    /// Position -> entities at that position. Never holds empty sets.
    cells: HashMap<Position, BTreeSet<EntityId>>,
    /// Entity -> its current position.
    positions: HashMap<EntityId, Position>,
}

impl SpatialIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `entity` at `position`. An entity that is already
    /// tracked is moved instead.
    pub(crate) fn insert(&mut self, entity: EntityId, position: Position) {
        if self.positions.contains_key(&entity) {
            // Cannot fail: the entity is tracked.
            let _ = self.relocate(entity, position);
            return;
        }
        self.cells.entry(position).or_default().insert(entity);
        self.positions.insert(entity, position);
    }

    /// Stop tracking `entity`, returning the position it occupied.
    pub(crate) fn remove(&mut self, entity: EntityId) -> Result<Position, EcsError> {
        let position = self
            .positions
            .remove(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        self.detach(entity, position);
        Ok(position)
    }

    /// Move a tracked entity to `target`.
    ///
    /// Removal from the old bucket and insertion into the new one are both
    /// O(1) hash operations (plus a small ordered-set update). Moving an
    /// entity onto its current position is a no-op.
    pub(crate) fn relocate(&mut self, entity: EntityId, target: Position) -> Result<(), EcsError> {
        let current = *self
            .positions
            .get(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        if current == target {
            return Ok(());
        }
        self.detach(entity, current);
        self.cells.entry(target).or_default().insert(entity);
        self.positions.insert(entity, target);
        Ok(())
    }

    /// Remove `entity` from the bucket at `position`, dropping the bucket if
    /// it becomes empty.
    fn detach(&mut self, entity: EntityId, position: Position) {
        if let Some(bucket) = self.cells.get_mut(&position) {
            bucket.remove(&entity);
            if bucket.is_empty() {
                self.cells.remove(&position);
            }
        }
    }

    /// The position of a tracked entity.
    pub fn position_of(&self, entity: EntityId) -> Result<Position, EcsError> {
        self.positions
            .get(&entity)
            .copied()
            .ok_or(EcsError::UnknownEntity(entity))
    }

    /// Entities at `position`, in ascending identifier order. Empty (never an
    /// error) when nothing is there.
    pub fn entities_at(&self, position: Position) -> impl Iterator<Item = EntityId> + '_ {
        self.cells
            .get(&position)
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Number of entities at `position`.
    pub fn count_at(&self, position: Position) -> usize {
        self.cells.get(&position).map_or(0, BTreeSet::len)
    }

    /// Whether `entity` is tracked.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.positions.contains_key(&entity)
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no entities are tracked.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of distinct occupied positions.
    pub fn occupied_cell_count(&self) -> usize {
        self.cells.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

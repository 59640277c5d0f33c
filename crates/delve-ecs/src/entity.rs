//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is an opaque 64-bit handle. Identifiers are either handed
//! out by the [`EntityAllocator`] (a monotonically increasing counter) or
//! supplied by the caller at spawn time. The world guarantees that no two live
//! entities share an identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque, hashable entity identifier.
///
/// Identity is stable for the lifetime of the entity. Once an entity is
/// despawned its identifier may be reused by a caller-supplied spawn, but the
/// allocator itself never hands out the same value twice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`. Used for caller-supplied identifiers.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out fresh [`EntityId`]s.
///
/// The counter starts at 1 and only moves forward. Because callers may claim
/// arbitrary identifiers, allocation skips any value the world reports as
/// taken.
#[derive(Debug)]
pub struct EntityAllocator {
    /// The next raw value to try.
    next: u64,
}

impl EntityAllocator {
    /// Create a new allocator. The first identifier handed out is `#1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate an identifier for which `is_taken` returns `false`.
    ///
    /// The game is turn based and entity churn is low, so the counter is never
    /// expected to wrap in practice.
    pub fn allocate(&mut self, is_taken: impl Fn(EntityId) -> bool) -> EntityId {
        loop {
            let candidate = EntityId(self.next);
            self.next = self.next.wrapping_add(1);
            if !is_taken(candidate) {
                return candidate;
            }
        }
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let ids: HashSet<EntityId> = (0..100).map(|_| alloc.allocate(|_| false)).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn first_id_is_one() {
        let mut alloc = EntityAllocator::new();
        assert_eq!(alloc.allocate(|_| false).to_raw(), 1);
        assert_eq!(alloc.allocate(|_| false).to_raw(), 2);
    }

    #[test]
    fn allocation_skips_taken_ids() {
        let mut alloc = EntityAllocator::new();
        let taken: HashSet<u64> = [1, 2, 4].into_iter().collect();
        let a = alloc.allocate(|id| taken.contains(&id.to_raw()));
        let b = alloc.allocate(|id| taken.contains(&id.to_raw()));
        assert_eq!(a.to_raw(), 3);
        assert_eq!(b.to_raw(), 5);
    }

    #[test]
    fn entity_id_roundtrip_and_formatting() {
        let id = EntityId::from_raw(42);
        assert_eq!(id.to_raw(), 42);
        assert_eq!(format!("{id}"), "#42");
        assert_eq!(format!("{id:?}"), "EntityId(42)");
    }
}

//! Per-thread bump arena with scoped checkpoint/restore (spec.md §5 "Arena
//! discipline").
//!
//! Replaces the source's pointer-rich per-read scratch memory (spec.md §9)
//! with a typed bump allocator: each worker thread owns one [`Arena`],
//! pushes per-read scratch (pattern, region profile, filtering buffers,
//! CIGAR buffer, SWG DP tables, BPM state, NS frontier) onto it, and restores
//! a checkpoint at stage and read boundaries. Match traces selected for
//! output are cloned out before the arena resets, so nothing borrowed from
//! the arena ever outlives a checkpoint restore.

use crate::error::CapacityError;

/// A bump allocator over a fixed-capacity byte buffer.
///
/// This crate's hot-path data (patterns, regions, candidates) are plain
/// owned `Vec`s rather than arena-borrowed slices, since Rust's borrow
/// checker makes a literal bump-allocated-slice API (as the source has)
/// awkward without `unsafe`. What this arena actually buys, in the same
/// spirit as the source's design, is a single capacity budget per read that
/// every stage draws down from and that is restored in O(1) between reads —
/// callers `try_reserve` against it before doing the corresponding `Vec`
/// allocation, so a misbehaving read fails fast with [`CapacityError`]
/// instead of growing unboundedly.
#[derive(Debug)]
pub struct Arena {
    capacity: usize,
    used: usize,
}

/// An opaque mark returned by [`Arena::checkpoint`]; pass it back to
/// [`Arena::restore`] to release everything reserved since.
#[derive(Clone, Copy, Debug)]
pub struct Checkpoint(usize);

impl Arena {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.used)
    }

    /// Releases everything reserved since `mark` was taken.
    pub fn restore(&mut self, mark: Checkpoint) {
        self.used = mark.0;
    }

    /// Reserves `bytes` more capacity, failing with [`CapacityError`] if
    /// doing so would exceed this arena's budget (spec.md §7
    /// `CapacityError`: "per-read arena exhausted").
    pub fn try_reserve(&mut self, bytes: usize) -> Result<(), CapacityError> {
        let new_used = self.used + bytes;
        if new_used > self.capacity {
            return Err(CapacityError {
                requested: bytes,
                available: self.capacity - self.used,
            });
        }
        self.used = new_used;
        Ok(())
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Resets the whole arena to empty, as happens between reads and on
    /// `CapacityError` recovery (spec.md §7: "the driver resets the arena").
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_restore_releases_reservations() {
        let mut arena = Arena::new(100);
        arena.try_reserve(40).unwrap();
        let mark = arena.checkpoint();
        arena.try_reserve(40).unwrap();
        assert_eq!(arena.used(), 80);
        arena.restore(mark);
        assert_eq!(arena.used(), 40);
    }

    #[test]
    fn over_budget_reservation_fails_without_mutating_state() {
        let mut arena = Arena::new(10);
        arena.try_reserve(5).unwrap();
        assert!(arena.try_reserve(6).is_err());
        assert_eq!(arena.used(), 5);
    }

    #[test]
    fn reset_clears_to_empty() {
        let mut arena = Arena::new(10);
        arena.try_reserve(10).unwrap();
        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.remaining(), 10);
    }
}

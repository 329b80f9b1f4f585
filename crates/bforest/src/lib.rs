//! A forest of small ordered B-trees sharing one node pool.
//!
//! The code generator creates many small ordered maps and sets over the
//! course of a single function compilation — per-block live sets, per-value
//! side tables built up incrementally during an analysis pass — and tears
//! them all down together when the pass finishes. Pooling their nodes in one
//! arena means that teardown is a single `clear()` rather than N separate
//! deallocations, and that the common case of a handful of entries per tree
//! never pays for an independent heap allocation.
//!
//! This is not a general-purpose replacement for a balanced tree library:
//! trees here are only ever grown and cleared wholesale, never partially
//! freed, and they're only efficient for the small sizes (tens to low
//! hundreds of entries) the compiler actually produces.

#![no_std]

extern crate alloc;

mod node;

pub use node::{Map, MapForest, Set, SetForest};

use core::cmp::Ordering;

/// Branching factor: an inner node holds between `INNER_SIZE - 1` and
/// `2 * INNER_SIZE - 1` keys (the root is exempt from the lower bound).
pub const INNER_SIZE: usize = 8;

/// Comparator used to order keys in a tree.
///
/// Splitting this out from `Ord` lets the same key type be ordered
/// differently in different trees (e.g. live ranges ordered by start
/// position in one tree and by end position in another).
pub trait Comparator<K> {
    /// Three-way compare `a` against `b`.
    fn cmp(&self, a: K, b: K) -> Ordering;
}

/// The natural `Ord`-based comparator, selected with `()` as the comparator
/// type when a tree's key type needs no custom ordering.
impl<K: Ord> Comparator<K> for () {
    fn cmp(&self, a: K, b: K) -> Ordering {
        Ord::cmp(&a, &b)
    }
}

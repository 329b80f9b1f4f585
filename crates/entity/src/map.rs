use crate::keys::EntityRef;
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A lazily-resizing map keyed by `K`, returning `V::default()` for any key
/// that hasn't been written yet.
///
/// Unlike [`PrimaryMap`](crate::PrimaryMap), a `SecondaryMap` does not own
/// key identity: it's a side table over keys that live in some other
/// primary map (e.g. per-`Value` source locations, per-`Block` visited
/// bits). Reading an out-of-range key is well-defined (it's the default),
/// but writing one grows the backing vector to fit.
#[derive(Clone)]
#[cfg_attr(feature = "enable-serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct SecondaryMap<K: EntityRef, V: Clone> {
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone + Default> SecondaryMap<K, V> {
    /// Create a new, empty map whose default value is `V::default()`.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone> SecondaryMap<K, V> {
    /// Create a new, empty map with an explicit default value.
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    /// Ensure the backing storage covers `k`, filling any gap with the
    /// default value.
    pub fn resize(&mut self, n: usize) {
        if n > self.elems.len() {
            self.elems.resize(n, self.default.clone());
        }
    }

    /// Read the value at `k`, or the default if it hasn't been set.
    pub fn get(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }

    /// Write `v` at `k`, growing the map (auto-resize) if necessary.
    pub fn set(&mut self, k: K, v: V) {
        self.resize(k.index() + 1);
        self.elems[k.index()] = v;
    }

    /// Get a mutable reference to the element at `k`, auto-resizing.
    pub fn get_mut(&mut self, k: K) -> &mut V {
        self.resize(k.index() + 1);
        &mut self.elems[k.index()]
    }

    /// Number of elements physically stored (not counting implicit defaults).
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Is the backing storage empty?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Remove every stored entry, retaining the backing allocation.
    pub fn clear(&mut self) {
        self.elems.clear();
    }

    /// Iterate over `(key, &value)` for physically stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.elems.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }
}

impl<K: EntityRef, V: Clone> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k)
    }
}

impl<K: EntityRef, V: Clone> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        self.get_mut(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_impl;

    #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    struct E(u32);
    entity_impl!(E, "e");

    #[test]
    fn auto_resize_on_set() {
        let mut m: SecondaryMap<E, u32> = SecondaryMap::new();
        let k = E::new(7);
        assert_eq!(*m.get(k), 0);
        m.set(k, 42);
        assert_eq!(*m.get(k), 42);
        assert_eq!(m.len(), 8);
    }

    #[test]
    fn unset_keys_read_as_default() {
        let mut m: SecondaryMap<E, bool> = SecondaryMap::new();
        m.set(E::new(3), true);
        assert!(!*m.get(E::new(0)));
        assert!(*m.get(E::new(3)));
        assert!(!*m.get(E::new(100)));
    }
}

use crate::{Comparator, INNER_SIZE};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::marker::PhantomData;

const MAX_KEYS: usize = 2 * INNER_SIZE - 1;
const MIN_KEYS: usize = INNER_SIZE - 1;

/// An index into a [`NodePool`]'s arena. `u32::MAX` is reserved to mean "no
/// node" (an empty tree).
#[derive(Copy, Clone, PartialEq, Eq)]
struct Node(u32);

impl Node {
    const NIL: Node = Node(u32::MAX);

    fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }
}

struct NodeData<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    /// Empty for a leaf; otherwise `keys.len() + 1` children.
    kids: Vec<Node>,
}

impl<K, V> NodeData<K, V> {
    fn leaf() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            kids: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.kids.is_empty()
    }
}

/// The shared arena backing every [`Map`] (and, via [`SetForest`], every
/// [`Set`]) of one key/value type. Clearing the forest drops every tree's
/// nodes at once.
pub struct MapForest<K, V> {
    nodes: Vec<NodeData<K, V>>,
}

impl<K, V> MapForest<K, V> {
    /// Create a new, empty forest.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Drop every tree's nodes at once, retaining the backing allocation.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn alloc(&mut self, data: NodeData<K, V>) -> Node {
        let idx = self.nodes.len() as u32;
        self.nodes.push(data);
        Node(idx)
    }

    fn get(&self, n: Node) -> &NodeData<K, V> {
        &self.nodes[n.0 as usize]
    }

    fn get_mut(&mut self, n: Node) -> &mut NodeData<K, V> {
        &mut self.nodes[n.0 as usize]
    }
}

impl<K, V> Default for MapForest<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered map `K -> V` whose nodes live in a [`MapForest`]. Cloning a
/// `Map` aliases the same nodes (it's a plain `Copy` handle), matching the
/// forest's "clone the handle, not the memory" design.
pub struct Map<K, V, C = ()> {
    root: Node,
    unused: PhantomData<(K, V, C)>,
}

impl<K, V, C> Clone for Map<K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, V, C> Copy for Map<K, V, C> {}

impl<K: Copy, V: Copy, C: Comparator<K> + Default> Map<K, V, C> {
    /// An empty map. Allocates no nodes until first insert.
    pub fn new() -> Self {
        Self {
            root: Node::NIL,
            unused: PhantomData,
        }
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.root.is_nil()
    }

    /// Look up `key`.
    pub fn get(&self, key: K, forest: &MapForest<K, V>) -> Option<V> {
        self.get_with(key, forest, &C::default())
    }

    /// Look up `key` using an explicit comparator instance.
    pub fn get_with(&self, key: K, forest: &MapForest<K, V>, comp: &C) -> Option<V> {
        let mut node = self.root;
        while !node.is_nil() {
            let data = forest.get(node);
            match search(&data.keys, key, comp) {
                Ok(i) => return Some(data.values[i]),
                Err(i) => {
                    if data.is_leaf() {
                        return None;
                    }
                    node = data.kids[i];
                }
            }
        }
        None
    }

    /// Insert `key -> value`, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V, forest: &mut MapForest<K, V>) -> Option<V> {
        self.insert_with(key, value, forest, &C::default())
    }

    /// Insert using an explicit comparator instance.
    pub fn insert_with(
        &mut self,
        key: K,
        value: V,
        forest: &mut MapForest<K, V>,
        comp: &C,
    ) -> Option<V> {
        if self.root.is_nil() {
            self.root = forest.alloc(NodeData::leaf());
        }
        if forest.get(self.root).keys.len() == MAX_KEYS {
            let old_root = self.root;
            let mut new_root = NodeData::leaf();
            new_root.kids.push(old_root);
            self.root = forest.alloc(new_root);
            split_child(forest, self.root, 0);
        }
        insert_non_full(forest, self.root, key, value, comp)
    }

    /// Remove `key`, returning its value if present.
    pub fn remove(&mut self, key: K, forest: &mut MapForest<K, V>) -> Option<V> {
        self.remove_with(key, forest, &C::default())
    }

    /// Remove using an explicit comparator instance.
    pub fn remove_with(&mut self, key: K, forest: &mut MapForest<K, V>, comp: &C) -> Option<V> {
        if self.root.is_nil() {
            return None;
        }
        let result = remove_from(forest, self.root, key, comp);
        let root_data = forest.get(self.root);
        if root_data.keys.is_empty() {
            self.root = if root_data.is_leaf() {
                Node::NIL
            } else {
                root_data.kids[0]
            };
        }
        result
    }

    /// Iterate over `(key, value)` pairs in ascending key order.
    ///
    /// Collects eagerly into the returned iterator's backing storage; trees
    /// here are small enough (tens to low hundreds of entries) that this is
    /// simpler than a lazy cursor and just as fast in practice.
    pub fn iter(&self, forest: &MapForest<K, V>) -> Iter<K, V> {
        let mut items = Vec::new();
        in_order(forest, self.root, &mut items);
        Iter {
            items,
            pos: 0,
        }
    }
}

impl<K: Copy, V: Copy, C: Comparator<K> + Default> Default for Map<K, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

fn in_order<K: Copy, V: Copy>(forest: &MapForest<K, V>, node: Node, out: &mut Vec<(K, V)>) {
    if node.is_nil() {
        return;
    }
    let data = forest.get(node);
    for i in 0..data.keys.len() {
        if !data.is_leaf() {
            in_order(forest, data.kids[i], out);
        }
        out.push((data.keys[i], data.values[i]));
    }
    if !data.is_leaf() {
        in_order(forest, *data.kids.last().unwrap(), out);
    }
}

/// In-order iterator over a [`Map`].
pub struct Iter<K, V> {
    items: Vec<(K, V)>,
    pos: usize,
}

impl<K: Copy, V: Copy> Iterator for Iter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let item = *self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }
}

fn search<K: Copy, C: Comparator<K>>(keys: &[K], key: K, comp: &C) -> Result<usize, usize> {
    let mut lo = 0;
    let mut hi = keys.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        match comp.cmp(keys[mid], key) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Ok(mid),
        }
    }
    Err(lo)
}

/// Split the full child at `kids[i]` of `parent`, promoting its median key
/// into `parent`.
fn split_child<K: Copy, V: Copy>(forest: &mut MapForest<K, V>, parent: Node, i: usize) {
    let child = forest.get(parent).kids[i];
    let mid = MAX_KEYS / 2;
    let child_data = forest.get_mut(child);
    let mid_key = child_data.keys[mid];
    let mid_val = child_data.values[mid];

    let right_keys = child_data.keys.split_off(mid + 1);
    let right_vals = child_data.values.split_off(mid + 1);
    child_data.keys.pop(); // drop mid_key, now duplicated into `right`'s split point
    child_data.values.pop();
    let right_kids = if child_data.is_leaf() {
        Vec::new()
    } else {
        child_data.kids.split_off(mid + 1)
    };

    let right = NodeData {
        keys: right_keys,
        values: right_vals,
        kids: right_kids,
    };
    let right_node = forest.alloc(right);

    let parent_data = forest.get_mut(parent);
    parent_data.keys.insert(i, mid_key);
    parent_data.values.insert(i, mid_val);
    parent_data.kids.insert(i + 1, right_node);
}

fn insert_non_full<K: Copy, V: Copy, C: Comparator<K>>(
    forest: &mut MapForest<K, V>,
    node: Node,
    key: K,
    value: V,
    comp: &C,
) -> Option<V> {
    let keys = forest.get(node).keys.clone();
    match search(&keys, key, comp) {
        Ok(i) => {
            let data = forest.get_mut(node);
            Some(core::mem::replace(&mut data.values[i], value))
        }
        Err(i) => {
            if forest.get(node).is_leaf() {
                let data = forest.get_mut(node);
                data.keys.insert(i, key);
                data.values.insert(i, value);
                None
            } else {
                let mut child_idx = i;
                let child = forest.get(node).kids[child_idx];
                if forest.get(child).keys.len() == MAX_KEYS {
                    split_child(forest, node, child_idx);
                    if comp.cmp(forest.get(node).keys[child_idx], key) == Ordering::Less {
                        child_idx += 1;
                    }
                }
                let child = forest.get(node).kids[child_idx];
                insert_non_full(forest, child, key, value, comp)
            }
        }
    }
}

fn remove_from<K: Copy, V: Copy, C: Comparator<K>>(
    forest: &mut MapForest<K, V>,
    node: Node,
    key: K,
    comp: &C,
) -> Option<V> {
    let keys = forest.get(node).keys.clone();
    match search(&keys, key, comp) {
        Ok(i) => {
            if forest.get(node).is_leaf() {
                let data = forest.get_mut(node);
                data.keys.remove(i);
                Some(data.values.remove(i))
            } else {
                remove_internal(forest, node, i, comp)
            }
        }
        Err(i) => {
            if forest.get(node).is_leaf() {
                None
            } else {
                let child = ensure_child_has_min_keys(forest, node, i, comp);
                remove_from(forest, child, key, comp)
            }
        }
    }
}

fn remove_internal<K: Copy, V: Copy, C: Comparator<K>>(
    forest: &mut MapForest<K, V>,
    node: Node,
    i: usize,
    comp: &C,
) -> Option<V> {
    let removed = forest.get(node).values[i];
    let left = forest.get(node).kids[i];
    let right = forest.get(node).kids[i + 1];
    if forest.get(left).keys.len() > MIN_KEYS {
        let (pred_key, pred_val) = predecessor(forest, left);
        remove_from(forest, left, pred_key, comp);
        let data = forest.get_mut(node);
        data.keys[i] = pred_key;
        data.values[i] = pred_val;
    } else if forest.get(right).keys.len() > MIN_KEYS {
        let (succ_key, succ_val) = successor(forest, right);
        remove_from(forest, right, succ_key, comp);
        let data = forest.get_mut(node);
        data.keys[i] = succ_key;
        data.values[i] = succ_val;
    } else {
        merge_children(forest, node, i);
        let merged = forest.get(node).kids[i];
        let sep_key = forest.get(merged).keys[MIN_KEYS];
        remove_from(forest, merged, sep_key, comp);
    }
    Some(removed)
}

fn predecessor<K: Copy, V: Copy>(forest: &MapForest<K, V>, mut node: Node) -> (K, V) {
    loop {
        let data = forest.get(node);
        if data.is_leaf() {
            let last = data.keys.len() - 1;
            return (data.keys[last], data.values[last]);
        }
        node = *data.kids.last().unwrap();
    }
}

fn successor<K: Copy, V: Copy>(forest: &MapForest<K, V>, mut node: Node) -> (K, V) {
    loop {
        let data = forest.get(node);
        if data.is_leaf() {
            return (data.keys[0], data.values[0]);
        }
        node = data.kids[0];
    }
}

/// Merge `kids[i]` and `kids[i+1]` of `node`, pulling down separator key `i`.
fn merge_children<K: Copy, V: Copy>(forest: &mut MapForest<K, V>, node: Node, i: usize) {
    let left = forest.get(node).kids[i];
    let right = forest.get(node).kids[i + 1];
    let (sep_key, sep_val) = {
        let data = forest.get_mut(node);
        let k = data.keys.remove(i);
        let v = data.values.remove(i);
        data.kids.remove(i + 1);
        (k, v)
    };
    let (mut rk, mut rv, mut rkids) = {
        let right_data = forest.get_mut(right);
        (
            core::mem::take(&mut right_data.keys),
            core::mem::take(&mut right_data.values),
            core::mem::take(&mut right_data.kids),
        )
    };
    let left_data = forest.get_mut(left);
    left_data.keys.push(sep_key);
    left_data.values.push(sep_val);
    left_data.keys.append(&mut rk);
    left_data.values.append(&mut rv);
    left_data.kids.append(&mut rkids);
}

/// Ensure `kids[i]` of `node` has more than `MIN_KEYS` keys before
/// descending into it, by borrowing from a sibling or merging.
fn ensure_child_has_min_keys<K: Copy, V: Copy, C: Comparator<K>>(
    forest: &mut MapForest<K, V>,
    node: Node,
    i: usize,
    _comp: &C,
) -> Node {
    let child = forest.get(node).kids[i];
    if forest.get(child).keys.len() > MIN_KEYS {
        return child;
    }
    let num_kids = forest.get(node).kids.len();
    let left_sib = if i > 0 {
        Some(forest.get(node).kids[i - 1])
    } else {
        None
    };
    let right_sib = if i + 1 < num_kids {
        Some(forest.get(node).kids[i + 1])
    } else {
        None
    };

    if let Some(left) = left_sib.filter(|&l| forest.get(l).keys.len() > MIN_KEYS) {
        // Rotate right: move node's separator down into child, left's last
        // key up into node.
        let (lk, lv) = {
            let ld = forest.get_mut(left);
            (ld.keys.pop().unwrap(), ld.values.pop().unwrap())
        };
        let lkid = if forest.get(left).is_leaf() {
            None
        } else {
            forest.get_mut(left).kids.pop()
        };
        let (sep_k, sep_v) = {
            let nd = forest.get_mut(node);
            let sk = nd.keys[i - 1];
            let sv = nd.values[i - 1];
            nd.keys[i - 1] = lk;
            nd.values[i - 1] = lv;
            (sk, sv)
        };
        let cd = forest.get_mut(child);
        cd.keys.insert(0, sep_k);
        cd.values.insert(0, sep_v);
        if let Some(k) = lkid {
            cd.kids.insert(0, k);
        }
        child
    } else if let Some(right) = right_sib.filter(|&r| forest.get(r).keys.len() > MIN_KEYS) {
        // Rotate left: move node's separator down into child, right's first
        // key up into node.
        let (rk, rv) = {
            let rd = forest.get_mut(right);
            (rd.keys.remove(0), rd.values.remove(0))
        };
        let rkid = if forest.get(right).is_leaf() {
            None
        } else {
            Some(forest.get_mut(right).kids.remove(0))
        };
        let (sep_k, sep_v) = {
            let nd = forest.get_mut(node);
            let sk = nd.keys[i];
            let sv = nd.values[i];
            nd.keys[i] = rk;
            nd.values[i] = rv;
            (sk, sv)
        };
        let cd = forest.get_mut(child);
        cd.keys.push(sep_k);
        cd.values.push(sep_v);
        if let Some(k) = rkid {
            cd.kids.push(k);
        }
        child
    } else if left_sib.is_some() {
        merge_children(forest, node, i - 1);
        forest.get(node).kids[i - 1]
    } else {
        merge_children(forest, node, i);
        forest.get(node).kids[i]
    }
}

/// A forest of [`Set`] instances sharing one node pool.
pub struct SetForest<K> {
    inner: MapForest<K, ()>,
}

impl<K> SetForest<K> {
    /// Create a new, empty forest.
    pub fn new() -> Self {
        Self {
            inner: MapForest::new(),
        }
    }

    /// Drop every set's nodes at once, retaining the backing allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<K> Default for SetForest<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered set of `K`, built on the same node representation as [`Map`].
pub struct Set<K, C = ()> {
    inner: Map<K, (), C>,
}

impl<K, C> Clone for Set<K, C> {
    fn clone(&self) -> Self {
        Set { inner: self.inner }
    }
}
impl<K, C> Copy for Set<K, C> {}

impl<K: Copy, C: Comparator<K> + Default> Set<K, C> {
    /// An empty set.
    pub fn new() -> Self {
        Self { inner: Map::new() }
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Does the set contain `key`?
    pub fn contains(&self, key: K, forest: &SetForest<K>) -> bool {
        self.inner.get(key, &forest.inner).is_some()
    }

    /// Insert `key`, returning whether it was newly inserted.
    pub fn insert(&mut self, key: K, forest: &mut SetForest<K>) -> bool {
        self.inner.insert(key, (), &mut forest.inner).is_none()
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: K, forest: &mut SetForest<K>) -> bool {
        self.inner.remove(key, &mut forest.inner).is_some()
    }

    /// Iterate over members in ascending order.
    pub fn iter<'a>(&self, forest: &'a SetForest<K>) -> impl Iterator<Item = K> + 'a {
        self.inner.iter(&forest.inner).map(|(k, ())| k)
    }
}

impl<K: Copy, C: Comparator<K> + Default> Default for Set<K, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut forest: MapForest<i32, &str> = MapForest::new();
        let mut map: Map<i32, &str> = Map::new();
        for i in 0..200 {
            map.insert(i, "x", &mut forest);
        }
        for i in 0..200 {
            assert_eq!(map.get(i, &forest), Some("x"));
        }
        for i in (0..200).step_by(2) {
            assert_eq!(map.remove(i, &mut forest), Some("x"));
        }
        for i in 0..200 {
            assert_eq!(map.get(i, &forest), if i % 2 == 0 { None } else { Some("x") });
        }
    }

    #[test]
    fn iteration_is_sorted() {
        let mut forest: MapForest<i32, i32> = MapForest::new();
        let mut map: Map<i32, i32> = Map::new();
        for i in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
            map.insert(i, i * 10, &mut forest);
        }
        let collected: Vec<_> = map.iter(&forest).collect();
        let expected: Vec<_> = (0..10).map(|i| (i, i * 10)).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn bulk_clear_reuses_allocation() {
        let mut forest: MapForest<i32, i32> = MapForest::new();
        let mut map: Map<i32, i32> = Map::new();
        for i in 0..50 {
            map.insert(i, i, &mut forest);
        }
        forest.clear();
        map = Map::new();
        assert!(map.is_empty());
        map.insert(1, 1, &mut forest);
        assert_eq!(map.get(1, &forest), Some(1));
    }

    #[test]
    fn set_basic() {
        let mut forest: SetForest<i32> = SetForest::new();
        let mut set: Set<i32> = Set::new();
        assert!(set.insert(1, &mut forest));
        assert!(!set.insert(1, &mut forest));
        assert!(set.contains(1, &forest));
        assert!(set.remove(1, &mut forest));
        assert!(!set.contains(1, &forest));
    }
}

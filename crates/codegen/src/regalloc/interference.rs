//! The interference graph: which vregs' live ranges overlap and therefore
//! cannot share a physical register. Built by a sweep over ranges sorted by
//! start point rather than an all-pairs comparison, since a function's live
//! ranges are mostly short and local.

use super::liveness::{LiveRange, Liveness};
use crate::machinst::VReg;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::vec::Vec;

/// An undirected graph over vregs: `u` and `v` are connected iff their live
/// ranges overlap in at least one program point.
#[derive(Default)]
pub struct InterferenceGraph {
    edges: FxHashMap<VReg, BTreeSet<VReg>>,
}

impl InterferenceGraph {
    /// Sweep ranges ordered by start; keep a small active set of ranges
    /// that haven't ended yet and connect every new range to everything
    /// still active. O(n log n + e) instead of O(n^2) for functions with
    /// few simultaneously-live values, which is the common case.
    ///
    /// Two vregs only interfere if they'd compete for the same physical
    /// register, so a pair from different classes never gets an edge even
    /// if their ranges overlap.
    pub fn build(liveness: &Liveness) -> Self {
        let mut ranges: Vec<&LiveRange> = liveness.ranges.values().collect();
        ranges.sort_by_key(|r| r.start);

        let mut graph = InterferenceGraph::default();
        let mut active: Vec<&LiveRange> = Vec::new();
        for r in ranges {
            active.retain(|a| a.end > r.start);
            for a in &active {
                if a.vreg != r.vreg && a.vreg.class() == r.vreg.class() {
                    graph.add_edge(a.vreg, r.vreg);
                }
            }
            active.push(r);
        }
        graph
    }

    fn add_edge(&mut self, a: VReg, b: VReg) {
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    pub fn interferes(&self, a: VReg, b: VReg) -> bool {
        self.edges.get(&a).is_some_and(|s| s.contains(&b))
    }

    pub fn degree(&self, v: VReg) -> usize {
        self.edges.get(&v).map_or(0, |s| s.len())
    }

    pub fn neighbors(&self, v: VReg) -> impl Iterator<Item = VReg> + '_ {
        self.edges.get(&v).into_iter().flat_map(|s| s.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::RegClass;
    use rustc_hash::FxHashMap;

    fn vr(i: usize) -> VReg {
        VReg::new(i, RegClass::Int)
    }

    fn liveness_from(ranges: Vec<LiveRange>) -> Liveness {
        let mut m = FxHashMap::default();
        for r in ranges {
            m.insert(r.vreg, r);
        }
        Liveness { ranges: m }
    }

    #[test]
    fn overlapping_ranges_interfere() {
        let live = liveness_from(vec![
            LiveRange { vreg: vr(0), start: 0, end: 5 },
            LiveRange { vreg: vr(1), start: 3, end: 8 },
        ]);
        let g = InterferenceGraph::build(&live);
        assert!(g.interferes(vr(0), vr(1)));
        assert_eq!(g.degree(vr(0)), 1);
    }

    #[test]
    fn disjoint_ranges_do_not_interfere() {
        let live = liveness_from(vec![
            LiveRange { vreg: vr(0), start: 0, end: 5 },
            LiveRange { vreg: vr(1), start: 5, end: 8 },
        ]);
        let g = InterferenceGraph::build(&live);
        assert!(!g.interferes(vr(0), vr(1)));
        assert_eq!(g.degree(vr(0)), 0);
    }
}

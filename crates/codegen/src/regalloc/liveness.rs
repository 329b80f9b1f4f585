//! Per-vreg liveness: which instruction positions a value is live across,
//! computed in two passes — a local per-block use/def summary, then an
//! iterative backward dataflow fixpoint over the block graph for anything
//! that crosses a block boundary.

use crate::machinst::VReg;
use rustc_hash::{FxHashMap, FxHashSet};
use std::vec::Vec;

/// A position in the flattened, emission-order instruction stream. Regalloc
/// never needs a finer grain than "before" or "after" one of these, so a
/// single program point serves as both; `use` operands read the value live
/// at `pos`, `def` operands create the value live from `pos` onward.
pub type ProgPoint = u32;

/// The contiguous (half-open) ranges of program points over which one
/// `VReg` is live. A single vreg can have more than one range if it's
/// defined, dies, and (through coalescing or a loop back edge) becomes live
/// again — but this crate's lowering never reuses a vreg number, so in
/// practice each vreg has exactly one range per definition.
#[derive(Clone, Debug, Default)]
pub struct LiveRange {
    pub vreg: VReg,
    pub start: ProgPoint,
    pub end: ProgPoint,
}

impl LiveRange {
    pub fn contains(&self, point: ProgPoint) -> bool {
        point >= self.start && point < self.end
    }

    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One block's local liveness summary plus the dataflow solution once
/// `compute` has run: `live_in` holds every vreg live at block entry,
/// `live_out` every vreg live at block exit.
#[derive(Clone, Debug, Default)]
struct BlockLiveness {
    /// Used before any def in this block.
    use_: FxHashSet<VReg>,
    /// Defined somewhere in this block.
    def: FxHashSet<VReg>,
    live_in: FxHashSet<VReg>,
    live_out: FxHashSet<VReg>,
}

/// The result of liveness analysis over one function's `VCode`: a
/// `LiveRange` per vreg (start = first def, end = last use + 1, widened to
/// cover any block it's live through), ready for interference and
/// linear-scan to consume.
#[derive(Default)]
pub struct Liveness {
    pub ranges: FxHashMap<VReg, LiveRange>,
}

impl Liveness {
    /// `block_operands` gives, per block (in layout order), the `(uses,
    /// defs)` vreg sets in per-instruction granularity already flattened to
    /// block-local use-before-def / def summaries; `preds`/`succs` is the
    /// block CFG by index into the same vectors; `block_start`/`block_end`
    /// give each block's first and one-past-last `ProgPoint`.
    pub fn compute(
        block_uses_defs: &[(FxHashSet<VReg>, FxHashSet<VReg>)],
        preds: &[Vec<usize>],
        succs: &[Vec<usize>],
        block_ranges: &[(ProgPoint, ProgPoint)],
        per_inst_uses_defs: &[(Vec<VReg>, Vec<VReg>)],
        inst_block: &[usize],
    ) -> Self {
        let n = block_uses_defs.len();
        let mut blocks: Vec<BlockLiveness> = (0..n)
            .map(|i| BlockLiveness {
                use_: block_uses_defs[i].0.clone(),
                def: block_uses_defs[i].1.clone(),
                ..Default::default()
            })
            .collect();

        // Standard backward dataflow: live_out[b] = union of live_in[s] for
        // successors s; live_in[b] = use[b] union (live_out[b] - def[b]).
        // Blocks in this crate are few enough per function that a
        // worklist isn't worth the bookkeeping; iterate to a fixpoint.
        let mut changed = true;
        while changed {
            changed = false;
            for b in (0..n).rev() {
                let mut live_out = FxHashSet::default();
                for &s in &succs[b] {
                    live_out.extend(blocks[s].live_in.iter().copied());
                }
                let mut live_in = blocks[b].use_.clone();
                for v in &live_out {
                    if !blocks[b].def.contains(v) {
                        live_in.insert(*v);
                    }
                }
                if live_in != blocks[b].live_in || live_out != blocks[b].live_out {
                    blocks[b].live_in = live_in;
                    blocks[b].live_out = live_out;
                    changed = true;
                }
            }
            let _ = preds;
        }

        // Now walk each block's instructions to find the exact def point
        // (first write) and last use point for every vreg, widened by
        // live_in/live_out at the block boundaries.
        let mut ranges: FxHashMap<VReg, LiveRange> = FxHashMap::default();
        for (block_idx, &(start, end)) in block_ranges.iter().enumerate() {
            for &v in &blocks[block_idx].live_in {
                let r = ranges.entry(v).or_insert(LiveRange {
                    vreg: v,
                    start,
                    end: start,
                });
                r.start = r.start.min(start);
            }
            for &v in &blocks[block_idx].live_out {
                let r = ranges.entry(v).or_insert(LiveRange {
                    vreg: v,
                    start: end,
                    end,
                });
                r.end = r.end.max(end);
            }
        }
        for (point, (uses, defs)) in per_inst_uses_defs.iter().enumerate() {
            let point = point as ProgPoint;
            let block = inst_block[point as usize];
            let (_, block_end) = block_ranges[block];
            for &v in uses {
                let r = ranges.entry(v).or_insert(LiveRange {
                    vreg: v,
                    start: point,
                    end: point + 1,
                });
                r.end = r.end.max(point + 1).min(block_end);
            }
            for &v in defs {
                let r = ranges.entry(v).or_insert(LiveRange {
                    vreg: v,
                    start: point,
                    end: point + 1,
                });
                r.start = r.start.min(point);
                r.end = r.end.max(point + 1);
            }
        }

        Liveness { ranges }
    }

    pub fn range_of(&self, vreg: VReg) -> Option<&LiveRange> {
        self.ranges.get(&vreg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::RegClass;

    fn vr(i: usize) -> VReg {
        VReg::new(i, RegClass::Int)
    }

    #[test]
    fn single_block_range_spans_def_to_last_use() {
        // block 0: v0 = def; use v0; use v0; (3 instructions)
        let block_uses_defs = [(FxHashSet::default(), {
            let mut d = FxHashSet::default();
            d.insert(vr(0));
            d
        })];
        let per_inst = vec![
            (vec![], vec![vr(0)]),
            (vec![vr(0)], vec![]),
            (vec![vr(0)], vec![]),
        ];
        let inst_block = vec![0, 0, 0];
        let block_ranges = [(0u32, 3u32)];
        let live = Liveness::compute(
            &block_uses_defs,
            &[vec![]],
            &[vec![]],
            &block_ranges,
            &per_inst,
            &inst_block,
        );
        let r = live.range_of(vr(0)).unwrap();
        assert_eq!(r.start, 0);
        assert_eq!(r.end, 3);
    }

    #[test]
    fn value_live_across_block_boundary_extends_into_successor() {
        // block 0: v0 = def; jump. block 1 (successor): use v0.
        let mut def0 = FxHashSet::default();
        def0.insert(vr(0));
        let mut use1 = FxHashSet::default();
        use1.insert(vr(0));
        let block_uses_defs = [(FxHashSet::default(), def0), (use1, FxHashSet::default())];
        let per_inst = vec![(vec![], vec![vr(0)]), (vec![], vec![]), (vec![vr(0)], vec![])];
        let inst_block = vec![0, 0, 1];
        let block_ranges = [(0u32, 2u32), (2u32, 3u32)];
        let live = Liveness::compute(
            &block_uses_defs,
            &[vec![], vec![0]],
            &[vec![1], vec![]],
            &block_ranges,
            &per_inst,
            &inst_block,
        );
        let r = live.range_of(vr(0)).unwrap();
        assert_eq!(r.start, 0);
        assert_eq!(r.end, 3);
    }
}

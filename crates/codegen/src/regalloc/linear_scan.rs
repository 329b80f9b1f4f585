//! The linear-scan allocator: walk live ranges ordered by start point,
//! keeping a small active set per register class; when a class runs out of
//! physical registers, spill whichever active range's next use is
//! furthest away (Poletto & Sarkar's heuristic), since that's the one
//! whose register is cheapest to give up.

use super::interference::InterferenceGraph;
use super::liveness::{LiveRange, Liveness, ProgPoint};
use crate::machinst::{Allocation, OperandConstraint, PReg, RegClass, SpillSlot, VReg};
use rustc_hash::FxHashMap;
use std::vec::Vec;

/// Per-instruction-position operand constraints the allocator must satisfy,
/// keyed by vreg: a fixed-register requirement pins an allocation for the
/// vreg's *entire* live range to avoid inserting a move at every use (a
/// simplification this crate accepts; a finer split-at-fixed-use scheme is
/// future work).
pub struct AllocatorInput<'a> {
    pub liveness: &'a Liveness,
    pub interference: &'a InterferenceGraph,
    /// Physical registers available per class, in preference order (the
    /// allocator prefers earlier ones, leaving later ones for the target's
    /// own fixed-register needs).
    pub pool: &'a FxHashMap<RegClass, Vec<PReg>>,
    /// Vregs that must land in a specific physical register.
    pub fixed: &'a FxHashMap<VReg, PReg>,
    /// `Reuse` operands: the vreg on the right must end up wherever the
    /// vreg on the left does.
    pub reuse_pairs: &'a [(VReg, VReg)],
    /// Every use position of each vreg, ascending, for the furthest-next-use
    /// spill heuristic.
    pub use_positions: &'a FxHashMap<VReg, Vec<ProgPoint>>,
}

#[derive(Default)]
pub struct AllocatorOutput {
    pub allocations: FxHashMap<VReg, Allocation>,
    pub spill_slots_used: usize,
}

struct ActiveEntry {
    range_end: ProgPoint,
    vreg: VReg,
    preg: PReg,
}

pub fn allocate(input: &AllocatorInput) -> AllocatorOutput {
    let mut out = AllocatorOutput::default();

    let mut ranges: Vec<&LiveRange> = input.liveness.ranges.values().collect();
    ranges.sort_by_key(|r| r.start);

    // union-find-lite for reuse pairs: resolve each reuse target to the
    // vreg whose allocation it must copy.
    let mut reuse_of: FxHashMap<VReg, VReg> = FxHashMap::default();
    for &(dst, src) in input.reuse_pairs {
        reuse_of.insert(dst, src);
    }

    let mut free_by_class: FxHashMap<RegClass, Vec<PReg>> = input
        .pool
        .iter()
        .map(|(&c, regs)| (c, regs.clone()))
        .collect();
    let mut active: Vec<ActiveEntry> = Vec::new();
    let mut next_spill_index: u32 = 0;

    for r in ranges {
        // retire ranges that have ended by this range's start
        active.retain(|e| {
            if e.range_end <= r.start {
                free_by_class.entry(e.preg.class()).or_default().push(e.preg);
                false
            } else {
                true
            }
        });

        if let Some(&preg) = input.fixed.get(&r.vreg) {
            out.allocations.insert(r.vreg, Allocation::Reg(preg));
            free_by_class
                .get_mut(&preg.class())
                .map(|v| v.retain(|&p| p != preg));
            active.push(ActiveEntry {
                range_end: r.end,
                vreg: r.vreg,
                preg,
            });
            continue;
        }

        if let Some(&src) = reuse_of.get(&r.vreg) {
            if let Some(Allocation::Reg(preg)) = out.allocations.get(&src).copied() {
                out.allocations.insert(r.vreg, Allocation::Reg(preg));
                continue;
            }
        }

        let class = r.vreg.class();
        let pool = free_by_class.entry(class).or_default();
        if let Some(preg) = pool.pop() {
            out.allocations.insert(r.vreg, Allocation::Reg(preg));
            active.push(ActiveEntry {
                range_end: r.end,
                vreg: r.vreg,
                preg,
            });
        } else {
            // Spill: either this range or the active range (of the same
            // class) whose next use is furthest from r.start.
            let empty = Vec::new();
            let candidate_next_use = |v: VReg, from: ProgPoint| -> ProgPoint {
                input
                    .use_positions
                    .get(&v)
                    .unwrap_or(&empty)
                    .iter()
                    .copied()
                    .find(|&p| p >= from)
                    .unwrap_or(ProgPoint::MAX)
            };

            let same_class: Vec<usize> = active
                .iter()
                .enumerate()
                .filter(|(_, e)| e.preg.class() == class)
                .map(|(i, _)| i)
                .collect();

            let worst = same_class
                .iter()
                .copied()
                .max_by_key(|&i| candidate_next_use(active[i].vreg, r.start));

            let self_next_use = candidate_next_use(r.vreg, r.start);
            let worst_next_use = worst.map(|i| candidate_next_use(active[i].vreg, r.start));

            match (worst, worst_next_use) {
                (Some(i), Some(worst_use)) if worst_use > self_next_use => {
                    // evict the active range, hand its register to r
                    let preg = active[i].preg;
                    out.allocations
                        .insert(active[i].vreg, Allocation::Stack(fresh_slot(&mut next_spill_index)));
                    active.remove(i);
                    out.allocations.insert(r.vreg, Allocation::Reg(preg));
                    active.push(ActiveEntry {
                        range_end: r.end,
                        vreg: r.vreg,
                        preg,
                    });
                }
                _ => {
                    out.allocations
                        .insert(r.vreg, Allocation::Stack(fresh_slot(&mut next_spill_index)));
                }
            }
        }
    }

    out.spill_slots_used = next_spill_index as usize;
    let _ = OperandConstraint::AnyReg; // referenced for documentation purposes only
    out
}

fn fresh_slot(counter: &mut u32) -> SpillSlot {
    let slot = SpillSlot::from_u32(*counter);
    *counter += 1;
    slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::RegClass;

    fn vr(i: usize) -> VReg {
        VReg::new(i, RegClass::Int)
    }

    fn pr(i: u8) -> PReg {
        PReg::new(i, RegClass::Int)
    }

    fn single_range_liveness(pairs: Vec<(VReg, ProgPoint, ProgPoint)>) -> Liveness {
        let mut m = FxHashMap::default();
        for (vreg, start, end) in pairs {
            m.insert(vreg, LiveRange { vreg, start, end });
        }
        Liveness { ranges: m }
    }

    #[test]
    fn disjoint_ranges_reuse_the_same_register() {
        let live = single_range_liveness(vec![(vr(0), 0, 2), (vr(1), 2, 4)]);
        let interference = InterferenceGraph::build(&live);
        let mut pool = FxHashMap::default();
        pool.insert(RegClass::Int, vec![pr(0)]);
        let fixed = FxHashMap::default();
        let use_positions = FxHashMap::default();
        let input = AllocatorInput {
            liveness: &live,
            interference: &interference,
            pool: &pool,
            fixed: &fixed,
            reuse_pairs: &[],
            use_positions: &use_positions,
        };
        let out = allocate(&input);
        assert_eq!(out.allocations[&vr(0)], Allocation::Reg(pr(0)));
        assert_eq!(out.allocations[&vr(1)], Allocation::Reg(pr(0)));
        assert_eq!(out.spill_slots_used, 0);
    }

    #[test]
    fn overlapping_ranges_exceeding_pool_force_a_spill() {
        let live = single_range_liveness(vec![(vr(0), 0, 10), (vr(1), 1, 10)]);
        let interference = InterferenceGraph::build(&live);
        let mut pool = FxHashMap::default();
        pool.insert(RegClass::Int, vec![pr(0)]);
        let fixed = FxHashMap::default();
        let use_positions = FxHashMap::default();
        let input = AllocatorInput {
            liveness: &live,
            interference: &interference,
            pool: &pool,
            fixed: &fixed,
            reuse_pairs: &[],
            use_positions: &use_positions,
        };
        let out = allocate(&input);
        assert_eq!(out.spill_slots_used, 1);
        let stack_count = out
            .allocations
            .values()
            .filter(|a| matches!(a, Allocation::Stack(_)))
            .count();
        assert_eq!(stack_count, 1);
    }

    #[test]
    fn fixed_register_constraint_is_honored() {
        let live = single_range_liveness(vec![(vr(0), 0, 5)]);
        let interference = InterferenceGraph::build(&live);
        let mut pool = FxHashMap::default();
        pool.insert(RegClass::Int, vec![pr(0), pr(1)]);
        let mut fixed = FxHashMap::default();
        fixed.insert(vr(0), pr(1));
        let use_positions = FxHashMap::default();
        let input = AllocatorInput {
            liveness: &live,
            interference: &interference,
            pool: &pool,
            fixed: &fixed,
            reuse_pairs: &[],
            use_positions: &use_positions,
        };
        let out = allocate(&input);
        assert_eq!(out.allocations[&vr(0)], Allocation::Reg(pr(1)));
    }
}

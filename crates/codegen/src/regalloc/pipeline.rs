//! Glue that drives the liveness / interference / linear-scan / checker
//! pipeline over a target's `VCode`, so each backend's `compile` doesn't
//! have to re-derive per-block use/def sets and a block CFG by hand.

use super::checker::{check, CheckedInst, CheckerViolation};
use super::interference::InterferenceGraph;
use super::linear_scan::{allocate, AllocatorInput};
use super::liveness::Liveness;
use crate::machinst::{Allocation, MachInst, OperandConstraint, OperandPos, PReg, RegClass, VCode};
use rustc_hash::{FxHashMap, FxHashSet};
use std::vec::Vec;

/// Run the full allocation pipeline over `vcode`, then rewrite every
/// instruction's operands to their final `Allocation` in place via
/// `apply_allocs`. Fixed-register constraints (`OperandConstraint::FixedReg`,
/// e.g. an ABI argument or return-value slot) are read directly off each
/// instruction's `operands()` — lowering expresses them there rather than
/// through a side channel. Returns the number of spill slots the allocator
/// needed, and runs the debug-only checker over the result before applying
/// it.
pub fn allocate_vcode<I: MachInst>(
    vcode: &mut VCode<I>,
    pool: &FxHashMap<RegClass, Vec<PReg>>,
    run_checker: bool,
) -> Result<usize, CheckerViolation> {
    let fixed: FxHashMap<crate::machinst::VReg, PReg> = vcode
        .blocks
        .iter()
        .flat_map(|b| b.insts.iter())
        .flat_map(|(_, inst)| inst.operands())
        .filter_map(|op| match op.constraint {
            OperandConstraint::FixedReg(preg) => Some((op.vreg, preg)),
            _ => None,
        })
        .collect();

    let operands_per_inst: Vec<_> = vcode
        .blocks
        .iter()
        .flat_map(|b| b.insts.iter())
        .map(|(_, inst)| inst.operands())
        .collect();

    let mut block_ranges = Vec::with_capacity(vcode.blocks.len());
    let mut inst_block = Vec::with_capacity(operands_per_inst.len());
    let mut point: u32 = 0;
    for (bi, block) in vcode.blocks.iter().enumerate() {
        let start = point;
        for _ in &block.insts {
            inst_block.push(bi);
            point += 1;
        }
        block_ranges.push((start, point));
    }

    let label_to_block: FxHashMap<_, usize> = vcode
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.label, i))
        .collect();

    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); vcode.blocks.len()];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); vcode.blocks.len()];
    for (bi, block) in vcode.blocks.iter().enumerate() {
        let mut targets: Vec<usize> = block
            .insts
            .iter()
            .flat_map(|(_, inst)| inst.branch_targets())
            .filter_map(|l| label_to_block.get(&l).copied())
            .collect();
        let falls_through = block.insts.last().map(|(_, i)| !i.is_term()).unwrap_or(true);
        if falls_through && bi + 1 < vcode.blocks.len() {
            targets.push(bi + 1);
        }
        targets.sort_unstable();
        targets.dedup();
        for &t in &targets {
            succs[bi].push(t);
            preds[t].push(bi);
        }
    }

    let mut block_uses_defs = Vec::with_capacity(vcode.blocks.len());
    let mut per_inst_uses_defs = Vec::with_capacity(operands_per_inst.len());
    let mut use_positions: FxHashMap<crate::machinst::VReg, Vec<u32>> = FxHashMap::default();

    let mut flat_index = 0usize;
    for block in &vcode.blocks {
        let mut use_ = FxHashSet::default();
        let mut def = FxHashSet::default();
        for (_, inst) in &block.insts {
            let ops = inst.operands();
            let mut uses = Vec::new();
            let mut defs = Vec::new();
            for op in &ops {
                match op.pos {
                    OperandPos::Use => {
                        uses.push(op.vreg);
                        if !def.contains(&op.vreg) {
                            use_.insert(op.vreg);
                        }
                        use_positions.entry(op.vreg).or_default().push(flat_index as u32);
                    }
                    OperandPos::Def => {
                        defs.push(op.vreg);
                        def.insert(op.vreg);
                    }
                    OperandPos::UseDef => {
                        uses.push(op.vreg);
                        defs.push(op.vreg);
                        if !def.contains(&op.vreg) {
                            use_.insert(op.vreg);
                        }
                        def.insert(op.vreg);
                        use_positions.entry(op.vreg).or_default().push(flat_index as u32);
                    }
                }
            }
            per_inst_uses_defs.push((uses, defs));
            flat_index += 1;
        }
        block_uses_defs.push((use_, def));
    }
    for positions in use_positions.values_mut() {
        positions.sort_unstable();
    }

    let liveness = Liveness::compute(
        &block_uses_defs,
        &preds,
        &succs,
        &block_ranges,
        &per_inst_uses_defs,
        &inst_block,
    );
    let interference = InterferenceGraph::build(&liveness);

    let input = AllocatorInput {
        liveness: &liveness,
        interference: &interference,
        pool,
        fixed: &fixed,
        reuse_pairs: &[],
        use_positions: &use_positions,
    };
    let result = allocate(&input);

    if run_checker {
        let checked: Vec<CheckedInst> = vcode
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .map(|(_, inst)| {
                let ops = inst.operands();
                let allocations = ops
                    .iter()
                    .map(|op| {
                        result
                            .allocations
                            .get(&op.vreg)
                            .copied()
                            .unwrap_or(Allocation::None)
                    })
                    .collect();
                CheckedInst {
                    operands: ops,
                    allocations,
                }
            })
            .collect();
        check(&checked)?;
    }

    for block in &mut vcode.blocks {
        for (_, inst) in &mut block.insts {
            let ops = inst.operands();
            let allocs: Vec<Allocation> = ops
                .iter()
                .map(|op| {
                    result
                        .allocations
                        .get(&op.vreg)
                        .copied()
                        .unwrap_or(Allocation::None)
                })
                .collect();
            inst.apply_allocs(&allocs);
        }
    }

    Ok(result.spill_slots_used)
}

//! Target-independent machine-instruction vocabulary: the `MachInst` trait
//! each backend implements, the `VCode` container lowering builds and
//! regalloc mutates in place, and the code buffer / relocation types C7's
//! encoders write into.

mod buffer;
mod reg;

pub use buffer::{
    CodeOffset, KnownSymbol, LibCall, MachBuffer, MachLabel, MachReloc, RelocKind, RelocTarget,
};
pub use reg::{Allocation, Operand, OperandConstraint, OperandPos, PReg, RegClass, SpillSlot, VReg};

use crate::ir::Inst as SsaInst;
use std::vec::Vec;

/// The contract a target backend (x64, aarch64, ...) implements to plug
/// into lowering, register allocation, and emission.
///
/// Lowering walks SSA instructions in layout order and asks the backend to
/// translate each into zero or more `Self` values; regalloc only ever sees
/// `operands()` and rewrites them to `Allocation`s in place via
/// `apply_allocs`; emission asks the backend to turn the now-allocated
/// instruction into bytes.
pub trait MachInst: Clone {
    /// The operand slots this instruction reads and writes, in a stable
    /// order emission can rely on (e.g. "dst, then srcs").
    fn operands(&self) -> Vec<Operand>;

    /// Rewrite every vreg this instruction mentions to its final
    /// allocation, in the same order `operands()` reported them. Regalloc
    /// calls this exactly once per instruction, after solving constraints.
    fn apply_allocs(&mut self, allocs: &[Allocation]);

    /// True for register-to-register moves; let the allocator coalesce or
    /// elide them once both sides land in the same location.
    fn is_move(&self) -> Option<(VReg, VReg)> {
        None
    }

    /// True for unconditional or conditional control transfers; lets
    /// regalloc and the buffer know this ends a block.
    fn is_term(&self) -> bool {
        false
    }

    /// The labels this instruction may transfer control to, if any. Used to
    /// build the block-level control-flow graph liveness needs; empty for
    /// anything that isn't a branch.
    fn branch_targets(&self) -> Vec<MachLabel> {
        Vec::new()
    }
}

/// One basic block's worth of lowered instructions, plus the label
/// emission binds to its entry point.
pub struct VCodeBlock<I: MachInst> {
    pub label: MachLabel,
    pub insts: Vec<(SsaInst, I)>,
}

/// The whole lowered function: every block in final layout order. This is
/// what register allocation consumes and mutates (via `apply_allocs`) and
/// what emission walks to drive a `MachBuffer`.
pub struct VCode<I: MachInst> {
    pub blocks: Vec<VCodeBlock<I>>,
}

impl<I: MachInst> VCode<I> {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Every operand in the function, in emission order, paired with the
    /// instruction it belongs to. This is the flat view liveness analysis
    /// and the linear-scan allocator both index by position.
    pub fn operands_by_position(&self) -> Vec<Vec<Operand>> {
        self.blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .map(|(_, inst)| inst.operands())
            .collect()
    }

    pub fn inst_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }
}

impl<I: MachInst> Default for VCode<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FakeInst {
        ops: Vec<Operand>,
    }

    impl MachInst for FakeInst {
        fn operands(&self) -> Vec<Operand> {
            self.ops.clone()
        }
        fn apply_allocs(&mut self, _allocs: &[Allocation]) {}
    }

    #[test]
    fn vcode_counts_instructions_across_blocks() {
        let mut vcode: VCode<FakeInst> = VCode::new();
        let mut buf = MachBuffer::new();
        let l0 = buf.get_label();
        let l1 = buf.get_label();
        vcode.blocks.push(VCodeBlock {
            label: l0,
            insts: vec![(SsaInst::from_u32(0), FakeInst { ops: vec![] })],
        });
        vcode.blocks.push(VCodeBlock {
            label: l1,
            insts: vec![
                (SsaInst::from_u32(1), FakeInst { ops: vec![] }),
                (SsaInst::from_u32(2), FakeInst { ops: vec![] }),
            ],
        });
        assert_eq!(vcode.inst_count(), 3);
    }
}

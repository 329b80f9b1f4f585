//! The x86-64 machine instruction set this backend lowers into: just enough
//! shapes to cover integer arithmetic, comparisons, control flow, memory,
//! and calls.

use crate::ir::IntCC;
use crate::machinst::{
    Allocation, MachInst, MachLabel, Operand, OperandConstraint, OperandPos, PReg, RelocTarget, VReg,
};
use std::vec::Vec;

/// One register (or, post-allocation, memory) operand: a vreg the
/// allocator assigns a home to, and that home once assigned. `alloc` starts
/// `Allocation::None` at lowering time and is filled in by
/// [`MachInst::apply_allocs`]. `fixed`, when set, pins this particular
/// operand occurrence to a specific hardware register (an ABI argument or
/// return-value slot) rather than leaving the choice to the allocator.
#[derive(Copy, Clone, Debug)]
pub struct RegOperand {
    pub vreg: VReg,
    pub alloc: Allocation,
    pub fixed: Option<PReg>,
}

impl RegOperand {
    pub fn new(vreg: VReg) -> Self {
        Self {
            vreg,
            alloc: Allocation::None,
            fixed: None,
        }
    }

    pub fn new_fixed(vreg: VReg, preg: PReg) -> Self {
        Self {
            vreg,
            alloc: Allocation::None,
            fixed: Some(preg),
        }
    }

    fn operand(&self, pos: OperandPos) -> Operand {
        let constraint = match self.fixed {
            Some(preg) => OperandConstraint::FixedReg(preg),
            None => OperandConstraint::AnyReg,
        };
        Operand::new(self.vreg, constraint, pos)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Imul,
}

#[derive(Clone, Debug)]
pub enum Inst {
    MovRI {
        dst: RegOperand,
        imm: i64,
    },
    MovRR {
        dst: RegOperand,
        src: RegOperand,
    },
    /// Destructive two-operand ALU op: `dst := dst op src`.
    AluRR {
        op: AluOp,
        dst: RegOperand,
        src: RegOperand,
    },
    AluRI {
        op: AluOp,
        dst: RegOperand,
        imm: i32,
    },
    /// `dst := [base + offset]`.
    Load {
        dst: RegOperand,
        base: RegOperand,
        offset: i32,
    },
    /// `[base + offset] := src`.
    Store {
        src: RegOperand,
        base: RegOperand,
        offset: i32,
    },
    CmpRR {
        a: RegOperand,
        b: RegOperand,
    },
    CmpRI {
        a: RegOperand,
        imm: i32,
    },
    /// `dst := (flags satisfy cc) as i8`, zero-extended.
    SetCC {
        cc: IntCC,
        dst: RegOperand,
    },
    Jmp {
        target: MachLabel,
    },
    JmpIf {
        cc: IntCC,
        target: MachLabel,
    },
    /// Returns whatever is currently in `rax`; a value to return is moved
    /// there by a preceding fixed-register `MovRR`, not carried here.
    Ret,
    Call {
        target: RelocTarget,
        args: Vec<RegOperand>,
        ret: Option<RegOperand>,
    },
    Ud2,
}

impl MachInst for Inst {
    fn operands(&self) -> Vec<Operand> {
        use Inst::*;
        match self {
            MovRI { dst, .. } => vec![dst.operand(OperandPos::Def)],
            MovRR { dst, src } => vec![dst.operand(OperandPos::Def), src.operand(OperandPos::Use)],
            AluRR { dst, src, .. } => vec![dst.operand(OperandPos::UseDef), src.operand(OperandPos::Use)],
            AluRI { dst, .. } => vec![dst.operand(OperandPos::UseDef)],
            Load { dst, base, .. } => vec![dst.operand(OperandPos::Def), base.operand(OperandPos::Use)],
            Store { src, base, .. } => vec![src.operand(OperandPos::Use), base.operand(OperandPos::Use)],
            CmpRR { a, b } => vec![a.operand(OperandPos::Use), b.operand(OperandPos::Use)],
            CmpRI { a, .. } => vec![a.operand(OperandPos::Use)],
            SetCC { dst, .. } => vec![dst.operand(OperandPos::Def)],
            Jmp { .. } | JmpIf { .. } | Ret | Ud2 => vec![],
            Call { args, ret, .. } => {
                let mut ops: Vec<Operand> = args.iter().map(|a| a.operand(OperandPos::Use)).collect();
                if let Some(r) = ret {
                    ops.push(r.operand(OperandPos::Def));
                }
                ops
            }
        }
    }

    fn apply_allocs(&mut self, allocs: &[Allocation]) {
        use Inst::*;
        let mut it = allocs.iter().copied();
        match self {
            MovRI { dst, .. } => dst.alloc = it.next().unwrap(),
            MovRR { dst, src } => {
                dst.alloc = it.next().unwrap();
                src.alloc = it.next().unwrap();
            }
            AluRR { dst, src, .. } => {
                dst.alloc = it.next().unwrap();
                src.alloc = it.next().unwrap();
            }
            AluRI { dst, .. } => dst.alloc = it.next().unwrap(),
            Load { dst, base, .. } => {
                dst.alloc = it.next().unwrap();
                base.alloc = it.next().unwrap();
            }
            Store { src, base, .. } => {
                src.alloc = it.next().unwrap();
                base.alloc = it.next().unwrap();
            }
            CmpRR { a, b } => {
                a.alloc = it.next().unwrap();
                b.alloc = it.next().unwrap();
            }
            CmpRI { a, .. } => a.alloc = it.next().unwrap(),
            SetCC { dst, .. } => dst.alloc = it.next().unwrap(),
            Jmp { .. } | JmpIf { .. } | Ret | Ud2 => {}
            Call { args, ret, .. } => {
                for a in args.iter_mut() {
                    a.alloc = it.next().unwrap();
                }
                if let Some(r) = ret {
                    r.alloc = it.next().unwrap();
                }
            }
        }
    }

    fn is_move(&self) -> Option<(VReg, VReg)> {
        match self {
            Inst::MovRR { dst, src } => Some((dst.vreg, src.vreg)),
            _ => None,
        }
    }

    fn is_term(&self) -> bool {
        matches!(self, Inst::Jmp { .. } | Inst::JmpIf { .. } | Inst::Ret | Inst::Ud2)
    }

    fn branch_targets(&self) -> Vec<MachLabel> {
        match self {
            Inst::Jmp { target } => vec![*target],
            Inst::JmpIf { target, .. } => vec![*target],
            _ => vec![],
        }
    }
}

//! The AArch64 machine instruction set this backend lowers into. Mirrors
//! `isa::x64::inst::Inst`'s shape (the same handful of arithmetic/compare/
//! control-flow/memory forms a simple linear-scan backend needs), encoded
//! differently in `emit.rs` to match AArch64's fixed-width instruction
//! stream instead of x86's variable-length one.

use crate::ir::IntCC;
use crate::machinst::{
    Allocation, MachInst, MachLabel, Operand, OperandConstraint, OperandPos, PReg, RelocTarget, VReg,
};
use std::vec::Vec;

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
    Orr,
    Eor,
    Mul,
}

#[derive(Clone, Debug)]
pub enum Inst {
    MovI {
        dst: RegOperand,
        imm: i64,
    },
    MovR {
        dst: RegOperand,
        src: RegOperand,
    },
    /// Non-destructive three-operand form: `dst := a op b`.
    AluRRR {
        op: AluOp,
        dst: RegOperand,
        a: RegOperand,
        b: RegOperand,
    },
    AluRRI {
        op: AluOp,
        dst: RegOperand,
        a: RegOperand,
        imm: i32,
    },
    /// `dst := [base, #offset]` (`ldr`, unsigned scaled offset).
    Load {
        dst: RegOperand,
        base: RegOperand,
        offset: i32,
    },
    /// `[base, #offset] := src` (`str`, unsigned scaled offset).
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
    /// `dst := (flags satisfy cc) as i64`, via `cset`.
    CSet {
        cc: IntCC,
        dst: RegOperand,
    },
    B {
        target: MachLabel,
    },
    BCond {
        cc: IntCC,
        target: MachLabel,
    },
    Ret,
    Bl {
        target: RelocTarget,
        args: Vec<RegOperand>,
        ret: Option<RegOperand>,
    },
    Brk,
}

impl MachInst for Inst {
    fn operands(&self) -> Vec<Operand> {
        use Inst::*;
        match self {
            MovI { dst, .. } => vec![dst.operand(OperandPos::Def)],
            MovR { dst, src } => vec![dst.operand(OperandPos::Def), src.operand(OperandPos::Use)],
            AluRRR { dst, a, b, .. } => vec![
                dst.operand(OperandPos::Def),
                a.operand(OperandPos::Use),
                b.operand(OperandPos::Use),
            ],
            AluRRI { dst, a, .. } => vec![dst.operand(OperandPos::Def), a.operand(OperandPos::Use)],
            Load { dst, base, .. } => vec![dst.operand(OperandPos::Def), base.operand(OperandPos::Use)],
            Store { src, base, .. } => vec![src.operand(OperandPos::Use), base.operand(OperandPos::Use)],
            CmpRR { a, b } => vec![a.operand(OperandPos::Use), b.operand(OperandPos::Use)],
            CmpRI { a, .. } => vec![a.operand(OperandPos::Use)],
            CSet { dst, .. } => vec![dst.operand(OperandPos::Def)],
            B { .. } | BCond { .. } | Ret | Brk => vec![],
            Bl { args, ret, .. } => {
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
            MovI { dst, .. } => dst.alloc = it.next().unwrap(),
            MovR { dst, src } => {
                dst.alloc = it.next().unwrap();
                src.alloc = it.next().unwrap();
            }
            AluRRR { dst, a, b, .. } => {
                dst.alloc = it.next().unwrap();
                a.alloc = it.next().unwrap();
                b.alloc = it.next().unwrap();
            }
            AluRRI { dst, a, .. } => {
                dst.alloc = it.next().unwrap();
                a.alloc = it.next().unwrap();
            }
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
            CSet { dst, .. } => dst.alloc = it.next().unwrap(),
            B { .. } | BCond { .. } | Ret | Brk => {}
            Bl { args, ret, .. } => {
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
            Inst::MovR { dst, src } => Some((dst.vreg, src.vreg)),
            _ => None,
        }
    }

    fn is_term(&self) -> bool {
        matches!(self, Inst::B { .. } | Inst::BCond { .. } | Inst::Ret | Inst::Brk)
    }

    fn branch_targets(&self) -> Vec<MachLabel> {
        match self {
            Inst::B { target } => vec![*target],
            Inst::BCond { target, .. } => vec![*target],
            _ => vec![],
        }
    }
}

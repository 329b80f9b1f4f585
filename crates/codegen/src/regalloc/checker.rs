//! A debug-only sanity check on register allocation's output: replay every
//! instruction symbolically against the chosen allocations and confirm
//! every use reads the value its defining instruction actually produced,
//! never a stale or wrong-class one. This never runs in a release build's
//! hot path; it exists to catch allocator bugs in testing, not to recover
//! from them in production.

use crate::machinst::{Allocation, Operand, OperandConstraint, OperandPos, PReg, RegClass, VReg};
use rustc_hash::FxHashMap;
use std::fmt;
use std::vec::Vec;

/// Something the checker found wrong with an allocation: a stale or
/// missing value in a physical register/stack slot at the point a `VReg`
/// was read, or a class mismatch between a vreg and the location it was
/// assigned.
#[derive(Clone, Debug)]
pub enum CheckerViolation {
    /// `vreg` was read at instruction `inst_index` but its allocation held
    /// a different (or no) value.
    StaleValue { inst_index: usize, vreg: VReg },
    /// `vreg` belongs to `expected` but was allocated a location from
    /// `found`.
    ClassMismatch {
        vreg: VReg,
        expected: RegClass,
        found: RegClass,
    },
    /// A move between two stack locations was requested with no scratch
    /// register available to stage it through.
    StackToStackMoveWithNoScratch,
}

impl fmt::Display for CheckerViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CheckerViolation::StaleValue { inst_index, vreg } => {
                write!(f, "instruction {inst_index} read {vreg:?} from a location holding a stale value")
            }
            CheckerViolation::ClassMismatch {
                vreg,
                expected,
                found,
            } => {
                write!(f, "{vreg:?} expects class {expected} but was allocated a {found} location")
            }
            CheckerViolation::StackToStackMoveWithNoScratch => {
                write!(f, "stack-to-stack move requested with no scratch register available")
            }
        }
    }
}

/// One instruction's worth of input the checker replays: its operands
/// (pre-allocation, so the checker knows each operand's declared vreg and
/// class) and the allocation each operand was actually given.
pub struct CheckedInst {
    pub operands: Vec<Operand>,
    pub allocations: Vec<Allocation>,
}

/// Symbolically replay `insts` in order, tracking which vreg (if any) each
/// physical register currently holds, and confirm every use reads the
/// value its own def last wrote there.
pub fn check(insts: &[CheckedInst]) -> Result<(), CheckerViolation> {
    let mut reg_contents: FxHashMap<PReg, VReg> = FxHashMap::default();

    for (inst_index, inst) in insts.iter().enumerate() {
        for (operand, alloc) in inst.operands.iter().zip(&inst.allocations) {
            if let Allocation::Reg(preg) = alloc {
                if preg.class() != operand.vreg.class() {
                    return Err(CheckerViolation::ClassMismatch {
                        vreg: operand.vreg,
                        expected: operand.vreg.class(),
                        found: preg.class(),
                    });
                }
            }
            if matches!(operand.pos, OperandPos::Use | OperandPos::UseDef) {
                if let Allocation::Reg(preg) = alloc {
                    let held = reg_contents.get(preg).copied();
                    match held {
                        Some(v) if v == operand.vreg => {}
                        // A fixed-register use with nothing live there yet is
                        // an ABI argument already sitting in its register at
                        // function entry, not a stale read.
                        None if matches!(operand.constraint, OperandConstraint::FixedReg(_)) => {
                            reg_contents.insert(*preg, operand.vreg);
                        }
                        _ => {
                            return Err(CheckerViolation::StaleValue {
                                inst_index,
                                vreg: operand.vreg,
                            })
                        }
                    }
                }
            }
        }
        for (operand, alloc) in inst.operands.iter().zip(&inst.allocations) {
            if matches!(operand.pos, OperandPos::Def | OperandPos::UseDef) {
                if let Allocation::Reg(preg) = alloc {
                    reg_contents.insert(*preg, operand.vreg);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vr(i: usize) -> VReg {
        VReg::new(i, RegClass::Int)
    }
    fn pr(i: u8) -> PReg {
        PReg::new(i, RegClass::Int)
    }

    #[test]
    fn def_then_use_of_same_register_passes() {
        let insts = vec![
            CheckedInst {
                operands: vec![Operand::new(vr(0), OperandConstraint::AnyReg, OperandPos::Def)],
                allocations: vec![Allocation::Reg(pr(0))],
            },
            CheckedInst {
                operands: vec![Operand::new(vr(0), OperandConstraint::AnyReg, OperandPos::Use)],
                allocations: vec![Allocation::Reg(pr(0))],
            },
        ];
        assert!(check(&insts).is_ok());
    }

    #[test]
    fn use_of_register_never_defined_is_a_violation() {
        let insts = vec![CheckedInst {
            operands: vec![Operand::new(vr(0), OperandConstraint::AnyReg, OperandPos::Use)],
            allocations: vec![Allocation::Reg(pr(0))],
        }];
        assert!(matches!(
            check(&insts),
            Err(CheckerViolation::StaleValue { .. })
        ));
    }

    #[test]
    fn use_after_register_reused_by_another_def_is_stale() {
        let insts = vec![
            CheckedInst {
                operands: vec![Operand::new(vr(0), OperandConstraint::AnyReg, OperandPos::Def)],
                allocations: vec![Allocation::Reg(pr(0))],
            },
            CheckedInst {
                operands: vec![Operand::new(vr(1), OperandConstraint::AnyReg, OperandPos::Def)],
                allocations: vec![Allocation::Reg(pr(0))],
            },
            CheckedInst {
                operands: vec![Operand::new(vr(0), OperandConstraint::AnyReg, OperandPos::Use)],
                allocations: vec![Allocation::Reg(pr(0))],
            },
        ];
        assert!(matches!(
            check(&insts),
            Err(CheckerViolation::StaleValue { .. })
        ));
    }

    #[test]
    fn fixed_reg_use_with_nothing_prior_is_an_entry_argument() {
        let insts = vec![CheckedInst {
            operands: vec![Operand::new(
                vr(0),
                OperandConstraint::FixedReg(pr(0)),
                OperandPos::Use,
            )],
            allocations: vec![Allocation::Reg(pr(0))],
        }];
        assert!(check(&insts).is_ok());
    }
}

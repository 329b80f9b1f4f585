//! The peephole pass: local, single-instruction rewrites that shrink or
//! retype an instruction without changing what the function computes.
//! Runs once, after verification and before lowering, only when the
//! driver's `Flags::optimize()` is set.
//!
//! Two kinds of rewrite:
//! - **Constant folding**: both operands are literals, so the whole
//!   instruction becomes an `iconst`.
//! - **Identity simplification**: the instruction is redundant given an
//!   algebraic identity (`x+0`, `x*1`, `x&-1`, `x|0`, `x^0`, `icmp eq x,x`),
//!   so its result is made an alias of the operand it equals instead.
//!
//! Neither rewrite removes the instruction from the layout (this crate's
//! `Layout` has no delete operation, and none is needed): the instruction's
//! data is overwritten with `Opcode::Nop`, which every backend's lowering
//! already ignores, and its result value is aliased via
//! [`DataFlowGraph::change_to_alias`] so every later reader is redirected
//! transparently.

use super::condcodes::IntCC;
use super::dfg::DataFlowGraph;
use super::entities::{Inst, Value, ValueDef};
use super::function::Function;
use super::instructions::{InstructionData, Opcode};
use super::types::Type;

/// Run the peephole pass over every instruction in `func`, in layout order.
pub fn run(func: &mut Function) {
    let insts: std::vec::Vec<Inst> = func
        .layout
        .blocks()
        .flat_map(|b| func.layout.block_insts(b))
        .collect();
    let total = insts.len();
    for inst in insts {
        simplify(&mut func.dfg, inst);
    }
    log::trace!("peephole pass examined {total} instruction(s) in {}", func.name);
}

enum Simplified {
    /// Replace the instruction with `iconst ty, value`.
    ConstInt(Type, i64),
    /// The instruction's result is exactly `Value`; alias it and neutralize
    /// the instruction.
    Alias(Value),
}

fn simplify(dfg: &mut DataFlowGraph, inst: Inst) {
    let data = dfg.inst_data(inst).clone();
    let simplified = match &data {
        InstructionData::Binary { opcode, args } => simplify_binary(dfg, *opcode, args[0], args[1]),
        InstructionData::IntCompare { cond, args, .. } => simplify_icmp(dfg, *cond, args[0], args[1]),
        _ => None,
    };
    let Some(simplified) = simplified else {
        return;
    };
    let result = dfg.first_result(inst);
    match simplified {
        Simplified::ConstInt(ty, imm) => {
            *dfg.inst_data_mut(inst) = InstructionData::UnaryImm {
                opcode: Opcode::Iconst,
                imm,
            };
            let _ = ty;
        }
        Simplified::Alias(source) => {
            dfg.change_to_alias(result, source);
            *dfg.inst_data_mut(inst) = InstructionData::Nullary { opcode: Opcode::Nop };
        }
    }
}

/// The value `v` takes if it's the direct result of an `iconst`, following
/// any alias chain first.
fn const_int_of(dfg: &DataFlowGraph, v: Value) -> Option<i64> {
    match dfg.value_def(dfg.resolve_aliases(v)) {
        ValueDef::Result(def_inst, 0) => match dfg.inst_data(def_inst) {
            InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } => Some(*imm),
            _ => None,
        },
        _ => None,
    }
}

fn simplify_binary(dfg: &DataFlowGraph, opcode: Opcode, a: Value, b: Value) -> Option<Simplified> {
    let ty = dfg.value_type(a);
    let const_a = const_int_of(dfg, a);
    let const_b = const_int_of(dfg, b);

    if let (Some(x), Some(y)) = (const_a, const_b) {
        let folded = match opcode {
            Opcode::Iadd => x.wrapping_add(y),
            Opcode::Isub => x.wrapping_sub(y),
            Opcode::Imul => x.wrapping_mul(y),
            Opcode::Band => x & y,
            Opcode::Bor => x | y,
            Opcode::Bxor => x ^ y,
            _ => return None,
        };
        return Some(Simplified::ConstInt(ty, folded));
    }

    match opcode {
        Opcode::Iadd | Opcode::Bor | Opcode::Bxor => {
            if const_b == Some(0) {
                return Some(Simplified::Alias(a));
            }
            if const_a == Some(0) {
                return Some(Simplified::Alias(b));
            }
        }
        Opcode::Isub => {
            if const_b == Some(0) {
                return Some(Simplified::Alias(a));
            }
        }
        Opcode::Imul => {
            if const_b == Some(1) {
                return Some(Simplified::Alias(a));
            }
            if const_a == Some(1) {
                return Some(Simplified::Alias(b));
            }
            if const_b == Some(0) || const_a == Some(0) {
                return Some(Simplified::ConstInt(ty, 0));
            }
        }
        Opcode::Band => {
            if const_b == Some(-1) {
                return Some(Simplified::Alias(a));
            }
            if const_a == Some(-1) {
                return Some(Simplified::Alias(b));
            }
            if const_b == Some(0) || const_a == Some(0) {
                return Some(Simplified::ConstInt(ty, 0));
            }
        }
        _ => {}
    }
    None
}

/// `icmp` where both sides are provably the same value: the comparison's
/// outcome is known without looking at runtime bits at all.
fn simplify_icmp(dfg: &DataFlowGraph, cond: IntCC, a: Value, b: Value) -> Option<Simplified> {
    use IntCC::*;
    if dfg.resolve_aliases(a) != dfg.resolve_aliases(b) {
        return None;
    }
    let always_true = matches!(
        cond,
        Equal | SignedGreaterThanOrEqual | SignedLessThanOrEqual | UnsignedGreaterThanOrEqual | UnsignedLessThanOrEqual
    );
    Some(Simplified::ConstInt(Type::I8, always_true as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Cursor, Function, Signature};

    #[test]
    fn adding_zero_aliases_the_other_operand() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("add_zero", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let x = pos.ins().iconst(Type::I32, 41);
        let zero = pos.ins().iconst(Type::I32, 0);
        let sum = pos.ins().iadd(x, zero);
        pos.ins().return_(&[sum]);

        run(&mut func);

        assert_eq!(func.dfg.resolve_aliases(sum), x);
    }

    #[test]
    fn constant_operands_fold_to_iconst() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("fold", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let a = pos.ins().iconst(Type::I32, 2);
        let b = pos.ins().iconst(Type::I32, 3);
        let sum_inst;
        let sum = {
            let v = pos.ins().iadd(a, b);
            sum_inst = match func.dfg.value_def(v) {
                crate::ir::ValueDef::Result(inst, _) => inst,
                _ => unreachable!(),
            };
            v
        };
        pos.ins().return_(&[sum]);

        run(&mut func);

        match func.dfg.inst_data(sum_inst) {
            InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } => assert_eq!(*imm, 5),
            other => panic!("expected folded iconst, got {other:?}"),
        }
    }

    #[test]
    fn self_compare_for_equality_folds_true() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("self_eq", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let x = pos.ins().iconst(Type::I32, 7);
        let cmp_inst;
        let cmp = {
            let v = pos.ins().icmp(crate::ir::IntCC::Equal, x, x);
            cmp_inst = match func.dfg.value_def(v) {
                crate::ir::ValueDef::Result(inst, _) => inst,
                _ => unreachable!(),
            };
            v
        };
        pos.ins().return_(&[cmp]);

        run(&mut func);

        match func.dfg.inst_data(cmp_inst) {
            InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } => assert_eq!(*imm, 1),
            other => panic!("expected folded iconst, got {other:?}"),
        }
    }
}

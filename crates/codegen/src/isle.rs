//! Glue between the SSA instruction stream and the `retarget-isle` pattern
//! matcher: lowering doesn't hand-write a chain of `if let` on `Opcode`
//! plus operand shape to pick an instruction selection strategy, it builds
//! a small rule set once per backend and interprets it per instruction.
//!
//! The term this module's rules match against is [`LowerTerm`]: a flattened
//! view of one SSA instruction's opcode and its operands' "shape" (a
//! register, or a constant that fits some immediate width). A rule's
//! `result` is a `usize` the backend interprets as which lowering strategy
//! to use (e.g. "emit the register-immediate form" vs "materialize the
//! constant into a register first").

use crate::ir::{DataFlowGraph, Inst, InstructionData, Opcode, Value};
use retarget_isle::interp::Environment;
use retarget_isle::{Constraint, Pattern, PrimType, Rule, RuleSet, Symbol};
use std::fmt;
use std::vec::Vec;

/// One term lowering's rules match against: either the instruction itself
/// (so a rule can switch on its opcode) or one of its operand values,
/// reached via `Field { parent: instruction-binding, index }`.
#[derive(Clone, Debug)]
pub enum LowerTerm {
    Inst(Inst),
    Value(Value),
}

/// Distinguishes an operand's shape for pattern matching: a plain SSA value
/// (always a register once lowered) versus a value that's itself the
/// result of a constant-materializing instruction and so could instead be
/// folded into an immediate field.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum OperandShape {
    Reg,
    FitsImm8,
    FitsImm32,
}

/// Bridges [`LowerTerm`] to the matcher: `variant_of` reports an
/// instruction's arity (so rules can destructure its operands; this rule
/// set deliberately ignores *which* opcode it is, since the rhs-immediate
/// strategy applies identically to every commutative binary opcode) and
/// each argument's shape (so rules can switch on whether it's foldable
/// into an immediate); `field` projects operand `index` of an instruction.
pub struct LowerEnv<'a> {
    pub dfg: &'a DataFlowGraph,
}

/// The single `Variant` tag this module's patterns test an instruction
/// binding against: "some binary-shaped instruction", irrespective of
/// opcode.
const INST_TAG: u32 = 0;

impl<'a> Environment<LowerTerm> for LowerEnv<'a> {
    fn variant_of(&self, value: &LowerTerm) -> Option<(u32, u8)> {
        match value {
            LowerTerm::Inst(inst) => {
                let arity = self.dfg.inst_args(*inst).len() as u8;
                Some((INST_TAG, arity))
            }
            LowerTerm::Value(v) => {
                let shape = classify_value(self.dfg, *v);
                Some((shape as u32, 0))
            }
        }
    }

    fn field(&self, value: &LowerTerm, index: u8) -> LowerTerm {
        match value {
            LowerTerm::Inst(inst) => {
                let args = self.dfg.inst_args(*inst);
                LowerTerm::Value(args[index as usize])
            }
            LowerTerm::Value(_) => unreachable!("operand shapes have no sub-fields"),
        }
    }

    fn const_bool(&self, _value: &LowerTerm) -> Option<bool> {
        None
    }

    fn const_int(&self, _value: &LowerTerm) -> Option<(i128, PrimType)> {
        None
    }

    fn const_prim(&self, _value: &LowerTerm) -> Option<Symbol> {
        None
    }

    fn values_equal(&self, a: &LowerTerm, b: &LowerTerm) -> bool {
        match (a, b) {
            (LowerTerm::Inst(x), LowerTerm::Inst(y)) => x == y,
            (LowerTerm::Value(x), LowerTerm::Value(y)) => x == y,
            _ => false,
        }
    }
}

/// Classify `v` by whether it's the direct result of an `Iconst` that fits
/// an 8-bit or 32-bit signed immediate, or otherwise must be materialized
/// into a register before use.
fn classify_value(dfg: &DataFlowGraph, v: Value) -> OperandShape {
    if let crate::ir::ValueDef::Result(inst, 0) = dfg.value_def(v) {
        if let InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } = dfg.inst_data(inst) {
            if i8::try_from(*imm).is_ok() {
                return OperandShape::FitsImm8;
            }
            if i32::try_from(*imm).is_ok() {
                return OperandShape::FitsImm32;
            }
        }
    }
    OperandShape::Reg
}

/// If `v` is the direct result of an `Iconst`, its immediate value —
/// regardless of width, unlike `classify_value` which only cares whether it
/// fits a particular encoding. Used once a [`Strategy`] has picked an
/// immediate form, to fetch the actual bits to encode.
pub fn const_imm_of(dfg: &DataFlowGraph, v: Value) -> Option<i64> {
    if let crate::ir::ValueDef::Result(inst, 0) = dfg.value_def(v) {
        if let InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } = dfg.inst_data(inst) {
            return Some(*imm);
        }
    }
    None
}

/// Which lowering strategy a rule selects. Returned as a rule's `result`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Strategy {
    RegReg,
    RegImm8,
    RegImm32,
}

const STRATEGIES: [Strategy; 3] = [Strategy::RegReg, Strategy::RegImm8, Strategy::RegImm32];

/// Build the rule set this module's backends use to choose, per binary
/// instruction, whether its right-hand operand should be encoded as a
/// register or folded into an immediate field. Exposed so a backend's
/// `lower` implementation can compile it once (outside any per-function hot
/// path) and reuse the resulting [`retarget_isle::DecisionTree`] for every
/// function it compiles.
pub fn build_binop_rhs_strategy_rules() -> RuleSet {
    let mut rules = RuleSet::new();

    rules.add_rule(
        Pattern::Variant(
            INST_TAG,
            vec![
                Pattern::Wildcard,
                Pattern::Const(Constraint::Variant {
                    variant: OperandShape::FitsImm8 as u32,
                    arity: 0,
                }),
            ],
        ),
        20,
        Default::default(),
        Strategy::RegImm8 as usize,
    );
    rules.add_rule(
        Pattern::Variant(
            INST_TAG,
            vec![
                Pattern::Wildcard,
                Pattern::Const(Constraint::Variant {
                    variant: OperandShape::FitsImm32 as u32,
                    arity: 0,
                }),
            ],
        ),
        10,
        Default::default(),
        Strategy::RegImm32 as usize,
    );
    rules.add_rule(Pattern::Wildcard, 0, Default::default(), Strategy::RegReg as usize);

    rules
}

pub fn strategy_for_result(result: usize) -> Strategy {
    STRATEGIES[result]
}

/// Two rules conflict when they share a priority and a structurally
/// identical pattern but name different results: the decision tree
/// compiler breaks such ties by declaration order, which silently hides
/// one of the two rule authors' intent. Detected once, at rule-set build
/// time, not per function compiled.
#[derive(Clone, Debug)]
pub struct RuleConflict {
    pub priority: i32,
    pub rule_a: usize,
    pub rule_b: usize,
}

impl fmt::Display for RuleConflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rules {} and {} both match at priority {} with identical patterns but different results",
            self.rule_a, self.rule_b, self.priority
        )
    }
}

fn pattern_shape_key(pattern: &Pattern) -> Vec<u8> {
    // A cheap structural fingerprint: enough to tell "these two patterns
    // would reach the same decision-tree leaf under identical obligations"
    // apart from patterns that plainly differ. Good enough for conflict
    // detection since true aliasing additionally requires equal priority.
    fn walk(p: &Pattern, out: &mut Vec<u8>) {
        match p {
            Pattern::Wildcard => out.push(0),
            Pattern::Var(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Pattern::Const(c) => {
                out.push(2);
                match c {
                    Constraint::Variant { variant, arity } => {
                        out.push(0);
                        out.extend_from_slice(&variant.to_le_bytes());
                        out.push(*arity);
                    }
                    Constraint::ConstBool(b) => {
                        out.push(1);
                        out.push(*b as u8);
                    }
                    Constraint::ConstInt(v, ty) => {
                        out.push(2);
                        out.extend_from_slice(&v.to_le_bytes());
                        out.push(*ty as u8);
                    }
                    Constraint::ConstPrim(s) => {
                        out.push(3);
                        out.extend_from_slice(&s.to_le_bytes());
                    }
                }
            }
            Pattern::Variant(tag, fields) => {
                out.push(3);
                out.extend_from_slice(&tag.to_le_bytes());
                for f in fields {
                    walk(f, out);
                }
            }
            Pattern::And(subs) => {
                out.push(4);
                for s in subs {
                    walk(s, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(pattern, &mut out);
    out
}

/// Scan `rules` for same-priority, structurally-identical patterns whose
/// results differ.
pub fn detect_conflicts(rules: &[Rule]) -> Vec<RuleConflict> {
    let mut conflicts = Vec::new();
    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            let a = &rules[i];
            let b = &rules[j];
            if a.priority == b.priority
                && a.result != b.result
                && pattern_shape_key(&a.pattern) == pattern_shape_key(&b.pattern)
            {
                conflicts.push(RuleConflict {
                    priority: a.priority,
                    rule_a: i,
                    rule_b: j,
                });
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use retarget_isle::compile;

    #[test]
    fn ruleset_has_no_conflicts() {
        let mut rules = build_binop_rhs_strategy_rules();
        let _tree = compile(&mut rules);
        assert!(detect_conflicts(rules.rules()).is_empty());
    }

    #[test]
    fn identical_priority_and_pattern_with_different_results_is_a_conflict() {
        let mut rules = RuleSet::new();
        rules.add_rule(Pattern::Wildcard, 5, Default::default(), 0);
        rules.add_rule(Pattern::Wildcard, 5, Default::default(), 1);
        let conflicts = detect_conflicts(rules.rules());
        assert_eq!(conflicts.len(), 1);
    }
}

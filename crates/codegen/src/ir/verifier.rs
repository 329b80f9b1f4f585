//! The IR verifier: a handful of independent passes that each check one
//! class of invariant from §3 and report every violation they find as a
//! [`VerifierError`], rather than bailing out on the first one.
//!
//! Type/SSA/terminator violations are fatal: lowering assumes they can't
//! happen and will misbehave (or panic) if fed a function that violates
//! them. An unreachable block is merely a warning — dead code is harmless
//! to compile, just wasteful.

use super::dfg::DataFlowGraph;
use super::dominator_tree::DominatorTree;
use super::entities::{Block, Inst, Value, ValueDef};
use super::function::Function;
use super::instructions::{InstructionData, Opcode};
use super::types::Type;
use crate::flowgraph::ControlFlowGraph;
use std::format;
use std::string::String;
use std::vec::Vec;

/// How serious a [`VerifierError`] is.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    /// Aborts the compile: the function violates an invariant later passes
    /// depend on.
    Fatal,
    /// Surfaced to the caller but doesn't block compilation (currently only
    /// used for unreachable blocks).
    Warning,
}

/// What kind of invariant a [`VerifierError`] reports a violation of.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VerifierErrorKind {
    /// An instruction's argument or result type disagrees with its opcode.
    TypeMismatch,
    /// A use is not dominated by its value's definition.
    SsaViolation,
    /// A block has no terminator at all.
    MissingTerminator,
    /// A terminator opcode appears somewhere other than a block's last
    /// instruction.
    MisplacedTerminator,
    /// A branch's argument list length, or an argument's type, disagrees
    /// with its target block's parameters.
    BranchArity,
    /// A block cannot be reached from the entry block.
    UnreachableBlock,
}

/// One diagnostic produced by [`verify_function`].
#[derive(Clone, Debug)]
pub struct VerifierError {
    pub severity: Severity,
    pub kind: VerifierErrorKind,
    pub block: Option<Block>,
    pub inst: Option<Inst>,
    pub message: String,
}

impl VerifierError {
    fn fatal(kind: VerifierErrorKind, block: Option<Block>, inst: Option<Inst>, message: String) -> Self {
        Self {
            severity: Severity::Fatal,
            kind,
            block,
            inst,
            message,
        }
    }

    fn warning(kind: VerifierErrorKind, block: Option<Block>, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            block,
            inst: None,
            message,
        }
    }
}

/// Does this list of diagnostics contain at least one that must abort the
/// compile?
pub fn has_fatal_errors(errors: &[VerifierError]) -> bool {
    errors.iter().any(|e| e.severity == Severity::Fatal)
}

/// Run every verifier pass over `func`, returning every diagnostic found
/// (fatal and warning alike). An empty result means the function satisfies
/// every invariant in §3.
pub fn verify_function(func: &Function) -> Vec<VerifierError> {
    let mut errors = Vec::new();

    verify_opcode_types(func, &mut errors);
    verify_terminators(func, &mut errors);
    verify_branch_arity(func, &mut errors);

    // The SSA and reachability passes both need a dominator tree, which in
    // turn needs the blocks to actually have terminators; skip them if the
    // terminator pass already found a fatal problem; a function that's
    // missing terminators doesn't have a well-formed CFG to build one from.
    if !has_fatal_errors(&errors) {
        let cfg = ControlFlowGraph::with_function(func);
        let domtree = DominatorTree::with_function(func, &cfg);
        verify_ssa_dominance(func, &domtree, &mut errors);
        verify_reachability(func, &domtree, &mut errors);
    }

    if has_fatal_errors(&errors) {
        log::debug!(
            "function {} failed verification with {} fatal error(s)",
            func.name,
            errors.iter().filter(|e| e.severity == Severity::Fatal).count()
        );
    }

    errors
}

/// Pass 1: for each instruction, check argument count/types and result
/// count/types against what its opcode requires.
fn verify_opcode_types(func: &Function, errors: &mut Vec<VerifierError>) {
    let dfg = &func.dfg;
    for block in func.layout.blocks() {
        for inst in func.layout.block_insts(block) {
            check_inst_types(dfg, block, inst, errors);
        }
    }
}

fn check_inst_types(dfg: &DataFlowGraph, block: Block, inst: Inst, errors: &mut Vec<VerifierError>) {
    let data = dfg.inst_data(inst);
    let opcode = data.opcode();

    let same_type = |a: Value, b: Value, errors: &mut Vec<VerifierError>| {
        if dfg.value_type(a) != dfg.value_type(b) {
            errors.push(VerifierError::fatal(
                VerifierErrorKind::TypeMismatch,
                Some(block),
                Some(inst),
                format!(
                    "{opcode:?}: operand types disagree ({} vs {})",
                    dfg.value_type(a),
                    dfg.value_type(b)
                ),
            ));
        }
    };

    match data {
        InstructionData::Binary { args, .. } => {
            same_type(args[0], args[1], errors);
            let result = dfg.first_result(inst);
            same_type(result, args[0], errors);
        }
        InstructionData::BinaryImm { .. } => {}
        InstructionData::IntCompare { args, .. } => {
            same_type(args[0], args[1], errors);
            if dfg.value_type(dfg.first_result(inst)) != Type::I8 {
                errors.push(VerifierError::fatal(
                    VerifierErrorKind::TypeMismatch,
                    Some(block),
                    Some(inst),
                    "icmp must produce i8".into(),
                ));
            }
        }
        InstructionData::FloatCompare { args, .. } => {
            same_type(args[0], args[1], errors);
            if !dfg.value_type(args[0]).is_float() {
                errors.push(VerifierError::fatal(
                    VerifierErrorKind::TypeMismatch,
                    Some(block),
                    Some(inst),
                    "fcmp operands must be float-typed".into(),
                ));
            }
        }
        InstructionData::Store { args, .. } => {
            // args[1] is the address; no type constraint on it beyond being
            // a value, so nothing further to check here.
            let _ = args;
        }
        _ => {}
    }

    // Calls must pass the right number of arguments for the signature they
    // reference; result types likewise.
    if let InstructionData::Call { func_ref, args, .. } = data {
        let sig_ref = dfg.ext_func_signature(*func_ref);
        let sig = dfg.signature(sig_ref);
        let args = args.as_slice(dfg.value_list_pool());
        if args.len() != sig.params.len() {
            errors.push(VerifierError::fatal(
                VerifierErrorKind::TypeMismatch,
                Some(block),
                Some(inst),
                format!(
                    "call passes {} arguments, signature wants {}",
                    args.len(),
                    sig.params.len()
                ),
            ));
        } else {
            for (arg, &want) in args.iter().zip(sig.params.iter()) {
                if dfg.value_type(*arg) != want {
                    errors.push(VerifierError::fatal(
                        VerifierErrorKind::TypeMismatch,
                        Some(block),
                        Some(inst),
                        format!("call argument type {} does not match signature", dfg.value_type(*arg)),
                    ));
                }
            }
        }
    }
}

/// Pass 2: exactly one terminator, at the tail, per block.
fn verify_terminators(func: &Function, errors: &mut Vec<VerifierError>) {
    for block in func.layout.blocks() {
        let mut saw_terminator = false;
        for inst in func.layout.block_insts(block) {
            let is_last = Some(inst) == func.layout.last_inst(block);
            let is_terminator = func.dfg.opcode(inst).is_terminator();
            if is_terminator && !is_last {
                errors.push(VerifierError::fatal(
                    VerifierErrorKind::MisplacedTerminator,
                    Some(block),
                    Some(inst),
                    "terminator instruction appears mid-block".into(),
                ));
            }
            if is_last {
                saw_terminator = is_terminator;
            }
        }
        if !saw_terminator {
            errors.push(VerifierError::fatal(
                VerifierErrorKind::MissingTerminator,
                Some(block),
                func.layout.last_inst(block),
                "block has no terminator".into(),
            ));
        }
    }
}

/// Pass 3: every branch's argument list matches its target block's
/// parameter count and types, position-wise.
fn verify_branch_arity(func: &Function, errors: &mut Vec<VerifierError>) {
    let dfg = &func.dfg;
    for block in func.layout.blocks() {
        let Some(terminator) = func.layout.last_inst(block) else {
            continue;
        };
        for dest in dfg.branch_destinations(terminator) {
            let params = dfg.block_params(dest.block);
            let args = dest.args.as_slice(dfg.value_list_pool());
            if args.len() != params.len() {
                errors.push(VerifierError::fatal(
                    VerifierErrorKind::BranchArity,
                    Some(block),
                    Some(terminator),
                    format!(
                        "branch to {} passes {} arguments, block wants {}",
                        dest.block,
                        args.len(),
                        params.len()
                    ),
                ));
                continue;
            }
            for (arg, &param) in args.iter().zip(params.iter()) {
                if dfg.value_type(*arg) != dfg.value_type(param) {
                    errors.push(VerifierError::fatal(
                        VerifierErrorKind::BranchArity,
                        Some(block),
                        Some(terminator),
                        format!(
                            "branch to {} argument type {} does not match parameter type {}",
                            dest.block,
                            dfg.value_type(*arg),
                            dfg.value_type(param)
                        ),
                    ));
                }
            }
        }
    }
}

/// Pass 4: every use of a value is dominated by its definition.
fn verify_ssa_dominance(func: &Function, domtree: &DominatorTree, errors: &mut Vec<VerifierError>) {
    let dfg = &func.dfg;
    for block in func.layout.blocks() {
        for inst in func.layout.block_insts(block) {
            for arg in dfg.inst_args(inst) {
                if !value_dominates_use(func, domtree, arg, block, inst) {
                    errors.push(VerifierError::fatal(
                        VerifierErrorKind::SsaViolation,
                        Some(block),
                        Some(inst),
                        format!("use of {arg} is not dominated by its definition"),
                    ));
                }
            }
        }
    }
}

fn value_dominates_use(
    func: &Function,
    domtree: &DominatorTree,
    value: Value,
    use_block: Block,
    use_inst: Inst,
) -> bool {
    let def_block = match func.dfg.value_def(value) {
        ValueDef::Param(block, _) => block,
        ValueDef::Result(def_inst, _) => {
            let def_block = func
                .layout
                .inst_block(def_inst)
                .expect("defining instruction must be laid out");
            if def_block == use_block {
                // Same block: the def must precede the use in layout order.
                let mut cursor = func.layout.first_inst(use_block);
                while let Some(i) = cursor {
                    if i == use_inst {
                        return false; // reached the use before the def
                    }
                    if i == def_inst {
                        return true;
                    }
                    cursor = func.layout.next_inst(i);
                }
                return false;
            }
            def_block
        }
    };
    if def_block == use_block {
        return true; // block parameter dominates every instruction in its own block
    }
    domtree.dominates(def_block, use_block)
}

/// Pass 5: blocks unreachable from the entry are warnings, not errors.
fn verify_reachability(func: &Function, domtree: &DominatorTree, errors: &mut Vec<VerifierError>) {
    for block in func.layout.blocks() {
        if !domtree.is_reachable(block) {
            errors.push(VerifierError::warning(
                VerifierErrorKind::UnreachableBlock,
                Some(block),
                format!("{block} is not reachable from the entry block"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Cursor, Signature, Type};

    #[test]
    fn well_formed_function_has_no_errors() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("add", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let a = pos.ins().iconst(Type::I32, 1);
        let b = pos.ins().iconst(Type::I32, 2);
        let c = pos.ins().iadd(a, b);
        pos.ins().return_(&[c]);

        let errors = verify_function(&func);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn missing_terminator_is_fatal() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("no_ret", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().iconst(Type::I32, 1);

        let errors = verify_function(&func);
        assert!(has_fatal_errors(&errors));
        assert!(errors
            .iter()
            .any(|e| e.kind == VerifierErrorKind::MissingTerminator));
    }

    #[test]
    fn branch_arity_mismatch_is_fatal() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("bad_jump", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        func.dfg.append_block_param(b1, Type::I32);
        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().jump(b1, &[]);
        pos.insert_block(b1);
        pos.ins().return_(&[]);

        let errors = verify_function(&func);
        assert!(errors
            .iter()
            .any(|e| e.kind == VerifierErrorKind::BranchArity));
    }

    #[test]
    fn unreachable_block_is_a_warning_only() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("dead_block", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().return_(&[]);
        pos.insert_block(b1);
        pos.ins().return_(&[]);

        let errors = verify_function(&func);
        assert!(!has_fatal_errors(&errors));
        assert!(errors
            .iter()
            .any(|e| e.kind == VerifierErrorKind::UnreachableBlock
                && e.severity == Severity::Warning));
    }

    #[test]
    fn ssa_violation_detected_for_forward_reference_in_same_block() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("bad_order", sig);
        let b0 = func.create_block();
        // Manually build two instructions so the "use" is laid out before
        // its "definition", which InstBuilder's append-only API can't do by
        // accident; this exercises the raw DFG/layout path a legalization
        // pass might hit if it ever reorders incorrectly.
        let ty = Type::I32;
        let def_inst = func.dfg.make_inst(InstructionData::UnaryImm {
            opcode: Opcode::Iconst,
            imm: 1,
        });
        let def_value = func.dfg.append_result(def_inst, ty);
        let use_inst = func.dfg.make_inst(InstructionData::MultiAry {
            opcode: Opcode::Return,
            args: {
                let mut l = super::super::instructions::ValueList::new();
                l.push(def_value, func.dfg.value_list_pool_mut());
                l
            },
        });
        func.layout.append_inst(use_inst, b0);
        func.layout.append_inst(def_inst, b0);

        let errors = verify_function(&func);
        assert!(errors
            .iter()
            .any(|e| e.kind == VerifierErrorKind::SsaViolation));
    }
}

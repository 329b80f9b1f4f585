//! Lowering: walk a verified SSA `Function` block by block, in layout
//! order, translating each instruction into zero or more AArch64 `Inst`s
//! and assigning a fresh `VReg` to every SSA `Value` the first time it's
//! defined or received as a block parameter.
//!
//! Structurally identical to `isa::x64::lower` except for the instruction
//! shapes it emits: AArch64's ALU ops are non-destructive three-operand
//! forms (`AluRRR`/`AluRRI`), so unlike x64 there's no need to copy the
//! left operand into the destination register before operating on it.

use super::inst::{AluOp, Inst, RegOperand};
use super::regs::{ARG_REGS, RETURN_REG};
use crate::ir::{Function, InstructionData, Opcode};
use crate::isle::{build_binop_rhs_strategy_rules, const_imm_of, strategy_for_result, LowerEnv, LowerTerm, Strategy};
use crate::machinst::{MachLabel, RegClass, RelocTarget, VCode, VCodeBlock, VReg};
use retarget_entity::EntityRef;
use retarget_isle::interp::matches as isle_matches;
use retarget_isle::{DecisionTree, RuleSet};
use rustc_hash::FxHashMap;
use std::vec::Vec;

struct VRegAlloc {
    next: usize,
}

impl VRegAlloc {
    fn new() -> Self {
        Self { next: 0 }
    }

    fn fresh(&mut self, class: RegClass) -> VReg {
        let v = VReg::new(self.next, class);
        self.next += 1;
        v
    }
}

fn class_of(ty: crate::ir::Type) -> RegClass {
    if ty.is_float() {
        RegClass::Float
    } else {
        RegClass::Int
    }
}

/// Lower `func` into AArch64 `VCode`. Block `i` in layout order is assigned
/// `MachLabel::from_block_index(i)`.
pub fn lower(func: &Function) -> VCode<Inst> {
    let mut vcode = VCode::new();
    let mut vregs = VRegAlloc::new();
    let mut value_vreg: FxHashMap<crate::ir::Value, VReg> = FxHashMap::default();

    // Same rationale as the x64 backend: compile the strategy rule set
    // once per function lowered, keep the tree and the rule set it was
    // compiled from together.
    let mut strategy_rules = build_binop_rhs_strategy_rules();
    let strategy_tree = retarget_isle::compile(&mut strategy_rules);

    let blocks: Vec<_> = func.layout.blocks().collect();
    let block_label: FxHashMap<_, _> = blocks
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, MachLabel::from_block_index(i as u32)))
        .collect();

    for &block in &blocks {
        for &param in func.dfg.block_params(block) {
            let ty = func.dfg.value_type(param);
            value_vreg.insert(param, vregs.fresh(class_of(ty)));
        }
    }

    // Bind the entry block's params from the AAPCS64 argument registers via
    // a short-lived pinned temporary, same as x64 does for System V.
    let mut entry_arg_binds = Vec::new();
    if let Some(entry) = blocks.first().copied() {
        for (i, &param) in func.dfg.block_params(entry).iter().enumerate() {
            let dst = value_vreg[&param];
            let preg = ARG_REGS[i.min(ARG_REGS.len() - 1)];
            let tmp = vregs.fresh(preg.class());
            entry_arg_binds.push((
                crate::ir::Inst::from_u32(0),
                Inst::MovR {
                    dst: RegOperand::new(dst),
                    src: RegOperand::new_fixed(tmp, preg),
                },
            ));
        }
    }

    for (block_idx, &block) in blocks.iter().enumerate() {
        let mut insts = if block_idx == 0 {
            std::mem::take(&mut entry_arg_binds)
        } else {
            Vec::new()
        };
        for inst in func.layout.block_insts(block) {
            lower_inst(
                func,
                inst,
                &mut vregs,
                &mut value_vreg,
                &block_label,
                &strategy_rules,
                &strategy_tree,
                &mut insts,
            );
        }
        vcode.blocks.push(VCodeBlock {
            label: MachLabel::from_block_index(block_idx as u32),
            insts,
        });
    }

    vcode
}

fn lower_inst(
    func: &Function,
    inst: crate::ir::Inst,
    vregs: &mut VRegAlloc,
    value_vreg: &mut FxHashMap<crate::ir::Value, VReg>,
    block_label: &FxHashMap<crate::ir::Block, MachLabel>,
    strategy_rules: &RuleSet,
    strategy_tree: &DecisionTree,
    out: &mut Vec<(crate::ir::Inst, Inst)>,
) {
    let dfg = &func.dfg;
    let data = dfg.inst_data(inst);
    let op = data.opcode();

    macro_rules! vreg_of {
        ($v:expr) => {{
            let v = dfg.resolve_aliases($v);
            *value_vreg
                .entry(v)
                .or_insert_with(|| vregs.fresh(class_of(dfg.value_type(v))))
        }};
    }

    macro_rules! result_vreg {
        () => {{
            let r = dfg.first_result(inst);
            vreg_of!(r)
        }};
    }

    match data {
        InstructionData::UnaryImm { opcode: Opcode::Iconst, imm } => {
            let dst = result_vreg!();
            out.push((inst, Inst::MovI { dst: RegOperand::new(dst), imm: *imm }));
        }
        InstructionData::Binary { opcode, args } => {
            let alu_op = match opcode {
                Opcode::Iadd => Some(AluOp::Add),
                Opcode::Isub => Some(AluOp::Sub),
                Opcode::Imul => Some(AluOp::Mul),
                Opcode::Band => Some(AluOp::And),
                Opcode::Bor => Some(AluOp::Orr),
                Opcode::Bxor => Some(AluOp::Eor),
                _ => None,
            };
            if let Some(alu_op) = alu_op {
                let a = vreg_of!(args[0]);
                let dst = result_vreg!();
                let env = LowerEnv { dfg };
                let matched = isle_matches(strategy_tree, strategy_rules, &env, LowerTerm::Inst(inst));
                let strategy = matched.map(strategy_for_result).unwrap_or(Strategy::RegReg);
                let imm = match strategy {
                    Strategy::RegImm8 | Strategy::RegImm32 => const_imm_of(dfg, args[1]),
                    Strategy::RegReg => None,
                };
                match imm {
                    Some(imm32) if i32::try_from(imm32).is_ok() => {
                        out.push((
                            inst,
                            Inst::AluRRI {
                                op: alu_op,
                                dst: RegOperand::new(dst),
                                a: RegOperand::new(a),
                                imm: imm32 as i32,
                            },
                        ));
                    }
                    _ => {
                        let b = vreg_of!(args[1]);
                        out.push((
                            inst,
                            Inst::AluRRR {
                                op: alu_op,
                                dst: RegOperand::new(dst),
                                a: RegOperand::new(a),
                                b: RegOperand::new(b),
                            },
                        ));
                    }
                }
            }
        }
        InstructionData::IntCompare { cond, args, .. } => {
            let a = vreg_of!(args[0]);
            let b = vreg_of!(args[1]);
            let dst = result_vreg!();
            out.push((inst, Inst::CmpRR { a: RegOperand::new(a), b: RegOperand::new(b) }));
            out.push((inst, Inst::CSet { cc: *cond, dst: RegOperand::new(dst) }));
        }
        InstructionData::Jump { destination, .. } => {
            lower_block_call(func, destination, value_vreg, vregs, out, inst);
            let target = block_label[&destination.block];
            out.push((inst, Inst::B { target }));
        }
        InstructionData::Brif { arg, then, else_, .. } => {
            let cond = vreg_of!(*arg);
            out.push((inst, Inst::CmpRI { a: RegOperand::new(cond), imm: 0 }));
            lower_block_call(func, then, value_vreg, vregs, out, inst);
            let then_label = block_label[&then.block];
            out.push((inst, Inst::BCond { cc: crate::ir::IntCC::NotEqual, target: then_label }));
            lower_block_call(func, else_, value_vreg, vregs, out, inst);
            let else_label = block_label[&else_.block];
            out.push((inst, Inst::B { target: else_label }));
        }
        InstructionData::MultiAry { opcode: Opcode::Return, args } => {
            let arg_values = args.as_slice(dfg.value_list_pool());
            if let Some(&v) = arg_values.first() {
                let src = vreg_of!(v);
                let tmp = vregs.fresh(RETURN_REG.class());
                out.push((
                    inst,
                    Inst::MovR {
                        dst: RegOperand::new_fixed(tmp, RETURN_REG),
                        src: RegOperand::new(src),
                    },
                ));
            }
            out.push((inst, Inst::Ret));
        }
        InstructionData::Call { func_ref, args, .. } => {
            let arg_values: Vec<_> = args.as_slice(dfg.value_list_pool()).to_vec();
            let call_args: Vec<RegOperand> = arg_values.iter().map(|&v| RegOperand::new(vreg_of!(v))).collect();
            let ret = if dfg.inst_results(inst).is_empty() {
                None
            } else {
                Some(RegOperand::new(result_vreg!()))
            };
            out.push((
                inst,
                Inst::Bl {
                    target: RelocTarget::UserFunc(func_ref.index() as u32),
                    args: call_args,
                    ret,
                },
            ));
        }
        InstructionData::Nullary { opcode: Opcode::Trap } => {
            out.push((inst, Inst::Brk));
        }
        _ => {
            // Opcodes outside this lowering's scope (float ops, memory
            // ops) fall through silently here; a full backend would cover
            // every opcode `verify_function` allows.
            let _ = op;
        }
    }
}

fn lower_block_call(
    func: &Function,
    call: &crate::ir::BlockCall,
    value_vreg: &mut FxHashMap<crate::ir::Value, VReg>,
    vregs: &mut VRegAlloc,
    out: &mut Vec<(crate::ir::Inst, Inst)>,
    at: crate::ir::Inst,
) {
    let dfg = &func.dfg;
    let args = call.args.as_slice(dfg.value_list_pool()).to_vec();
    let params: Vec<_> = dfg.block_params(call.block).to_vec();
    if args.is_empty() {
        return;
    }
    // Same parallel-copy-via-temporaries approach as x64: stage every
    // argument into a fresh vreg first so any permutation (including
    // swaps) lowers correctly.
    let mut temps = Vec::with_capacity(args.len());
    for &a in &args {
        let a = dfg.resolve_aliases(a);
        let src = *value_vreg
            .entry(a)
            .or_insert_with(|| vregs.fresh(class_of(dfg.value_type(a))));
        let tmp = vregs.fresh(src.class());
        out.push((at, Inst::MovR { dst: RegOperand::new(tmp), src: RegOperand::new(src) }));
        temps.push(tmp);
    }
    for (param, tmp) in params.iter().zip(temps) {
        let dst = *value_vreg
            .entry(*param)
            .or_insert_with(|| vregs.fresh(tmp.class()));
        out.push((at, Inst::MovR { dst: RegOperand::new(dst), src: RegOperand::new(tmp) }));
    }
}

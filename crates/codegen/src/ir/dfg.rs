//! Data-flow graph: instructions, values, and blocks, and the def/use edges
//! between them.
//!
//! The DFG is deliberately separate from [`Layout`](super::Layout): an
//! instruction or block's *identity* (its results, its operands) lives
//! here, while its *position* in the program lives in the layout. Passes
//! that reorder code touch only the layout; passes that rewrite operands
//! touch only the DFG.

use super::entities::{Block, FuncRef, GlobalValue, Inst, SigRef, StackSlot, Value, ValueDef};
use super::instructions::{BlockCall, InstructionData, Opcode, ValueList};
use super::types::Type;
use super::function::Signature;
use retarget_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

/// One block's parameters: a list of `Value`s it defines, shared out of the
/// function's `ValueList` pool.
#[derive(Clone, Default)]
pub(crate) struct BlockData {
    params: ValueList,
}

/// How one `Value` is defined: a block parameter, an instruction result, or
/// (post-peephole) an alias standing in for another value entirely.
#[derive(Copy, Clone, Debug)]
enum ValueData {
    Param { ty: Type, num: u32, block: Block },
    Result { ty: Type, num: u32, inst: Inst },
    /// This value's instruction was simplified away; reads of it should be
    /// redirected to `original` instead. Chains are possible (an alias's
    /// target can itself become an alias) and are followed to a fixed point
    /// by [`DataFlowGraph::resolve_aliases`].
    Alias { ty: Type, original: Value },
}

/// The data-flow graph for one function: every instruction and block ever
/// created (whether or not currently reachable through the layout), every
/// value's definition and type, and the preamble tables of external
/// declarations an instruction can reference.
#[derive(Clone, Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<Inst, InstructionData>,
    blocks: PrimaryMap<Block, BlockData>,
    values: PrimaryMap<Value, ValueData>,
    results: SecondaryMap<Inst, ValueList>,
    value_lists: ListPool<Value>,
    pub(crate) signatures: PrimaryMap<SigRef, Signature>,
    pub(crate) ext_funcs: PrimaryMap<FuncRef, SigRef>,
    pub(crate) global_values: PrimaryMap<GlobalValue, ()>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove everything, retaining backing allocations for reuse.
    pub fn clear(&mut self) {
        self.insts.clear();
        self.blocks.clear();
        self.values.clear();
        self.results.clear();
        self.value_lists.clear();
        self.signatures.clear();
        self.ext_funcs.clear();
        self.global_values.clear();
    }

    // --- blocks -----------------------------------------------------

    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        let num = self.blocks[block].params.len(&self.value_lists) as u32;
        let value = self
            .values
            .push(ValueData::Param { ty, num, block });
        self.blocks[block].params.push(value, &mut self.value_lists);
        value
    }

    pub fn block_params(&self, block: Block) -> &[Value] {
        self.blocks[block].params.as_slice(&self.value_lists)
    }

    // --- instructions -------------------------------------------------

    /// Create an instruction with no results yet attached (callers finish
    /// construction through [`Self::append_result`] or
    /// [`Self::make_inst_results`]).
    pub fn make_inst(&mut self, data: InstructionData) -> Inst {
        let inst = self.insts.push(data);
        self.results.set(inst, ValueList::new());
        inst
    }

    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    pub fn inst_data_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    pub fn opcode(&self, inst: Inst) -> Opcode {
        self.insts[inst].opcode()
    }

    pub fn append_result(&mut self, inst: Inst, ty: Type) -> Value {
        let num = self.results[inst].len(&self.value_lists) as u32;
        let value = self.values.push(ValueData::Result { ty, num, inst });
        self.results[inst].push(value, &mut self.value_lists);
        value
    }

    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        self.results[inst].as_slice(&self.value_lists)
    }

    pub fn first_result(&self, inst: Inst) -> Value {
        self.inst_results(inst)[0]
    }

    /// The instruction's argument values, in a uniform shape regardless of
    /// which [`InstructionData`] variant it is.
    pub fn inst_args(&self, inst: Inst) -> SmallVec<[Value; 4]> {
        let mut out = SmallVec::new();
        match &self.insts[inst] {
            InstructionData::Nullary { .. } => {}
            InstructionData::UnaryImm { .. }
            | InstructionData::UnaryIeee32 { .. }
            | InstructionData::UnaryIeee64 { .. } => {}
            InstructionData::Unary { arg, .. } => out.push(*arg),
            InstructionData::Binary { args, .. } => out.extend_from_slice(args),
            InstructionData::BinaryImm { arg, .. } => out.push(*arg),
            InstructionData::IntCompare { args, .. } | InstructionData::FloatCompare { args, .. } => {
                out.extend_from_slice(args)
            }
            InstructionData::Jump { destination, .. } => {
                out.extend_from_slice(destination.args.as_slice(&self.value_lists));
            }
            InstructionData::Brif { arg, then, else_, .. } => {
                out.push(*arg);
                out.extend_from_slice(then.args.as_slice(&self.value_lists));
                out.extend_from_slice(else_.args.as_slice(&self.value_lists));
            }
            InstructionData::Call { args, .. } | InstructionData::MultiAry { args, .. } => {
                out.extend_from_slice(args.as_slice(&self.value_lists));
            }
            InstructionData::CallIndirect { callee, args, .. } => {
                out.push(*callee);
                out.extend_from_slice(args.as_slice(&self.value_lists));
            }
            InstructionData::Load { arg, .. } => out.push(*arg),
            InstructionData::Store { args, .. } => out.extend_from_slice(args),
            InstructionData::StackLoad { .. } => {}
            InstructionData::StackStore { arg, .. } => out.push(*arg),
        }
        out
    }

    /// The block(s) this instruction may transfer control to, each paired
    /// with its argument list.
    pub fn branch_destinations(&self, inst: Inst) -> SmallVec<[&BlockCall; 2]> {
        self.insts[inst].branch_destinations()
    }

    // --- values ---------------------------------------------------------

    pub fn value_type(&self, value: Value) -> Type {
        match self.values[value] {
            ValueData::Param { ty, .. } | ValueData::Result { ty, .. } | ValueData::Alias { ty, .. } => ty,
        }
    }

    /// What ultimately defines `value`: a block parameter or an instruction
    /// result. Transparently follows alias chains, so callers never need to
    /// special-case a value the peephole pass has rewritten.
    pub fn value_def(&self, value: Value) -> ValueDef {
        match self.values[self.resolve_aliases(value)] {
            ValueData::Param { num, block, .. } => ValueDef::Param(block, num),
            ValueData::Result { num, inst, .. } => ValueDef::Result(inst, num),
            ValueData::Alias { .. } => unreachable!("resolve_aliases always returns a non-alias"),
        }
    }

    /// Follow `value`'s alias chain (if any) to the value it ultimately
    /// stands for. A value that isn't an alias resolves to itself.
    pub fn resolve_aliases(&self, mut value: Value) -> Value {
        while let ValueData::Alias { original, .. } = self.values[value] {
            value = original;
        }
        value
    }

    /// Rewrite `value` to be an alias of `original`: every future read of
    /// `value` (through [`Self::value_def`] or a caller that resolves it
    /// explicitly) now sees `original` instead. Used by the peephole pass to
    /// eliminate an instruction whose result is provably equal to one of its
    /// own operands, without renumbering any entity.
    pub fn change_to_alias(&mut self, value: Value, original: Value) {
        let ty = self.value_type(value);
        debug_assert_eq!(ty, self.value_type(original), "alias must preserve type");
        self.values[value] = ValueData::Alias { ty, original };
    }

    pub fn value_list_pool(&self) -> &ListPool<Value> {
        &self.value_lists
    }

    pub fn value_list_pool_mut(&mut self) -> &mut ListPool<Value> {
        &mut self.value_lists
    }

    /// Build a `BlockCall` from a target block and a list of values bound
    /// to its parameters.
    pub fn block_call(&mut self, block: Block, args: &[Value]) -> BlockCall {
        BlockCall {
            block,
            args: EntityList::from_iter(args.iter().copied(), &mut self.value_lists),
        }
    }

    // --- preamble ---------------------------------------------------------

    pub fn import_signature(&mut self, sig: Signature) -> SigRef {
        self.signatures.push(sig)
    }

    pub fn signature(&self, sig_ref: SigRef) -> &Signature {
        &self.signatures[sig_ref]
    }

    pub fn import_function(&mut self, sig_ref: SigRef) -> FuncRef {
        self.ext_funcs.push(sig_ref)
    }

    pub fn ext_func_signature(&self, func_ref: FuncRef) -> SigRef {
        self.ext_funcs[func_ref]
    }

    pub fn create_global_value(&mut self) -> GlobalValue {
        self.global_values.push(())
    }

    pub fn stack_slot_offset(&self, _slot: StackSlot) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;

    #[test]
    fn block_params_are_distinct_values() {
        let mut dfg = DataFlowGraph::new();
        let block = dfg.make_block();
        let p0 = dfg.append_block_param(block, Type::I32);
        let p1 = dfg.append_block_param(block, Type::I32);
        assert_ne!(p0, p1);
        assert_eq!(dfg.block_params(block), &[p0, p1]);
        assert_eq!(dfg.value_type(p0), Type::I32);
    }

    #[test]
    fn instruction_results_accumulate() {
        let mut dfg = DataFlowGraph::new();
        let inst = dfg.make_inst(InstructionData::Binary {
            opcode: Opcode::Iadd,
            args: [Value::from_u32(0), Value::from_u32(0)],
        });
        let r = dfg.append_result(inst, Type::I32);
        assert_eq!(dfg.inst_results(inst), &[r]);
        assert_eq!(dfg.first_result(inst), r);
        match dfg.value_def(r) {
            ValueDef::Result(i, 0) => assert_eq!(i, inst),
            other => panic!("unexpected value def {other:?}"),
        }
    }
}

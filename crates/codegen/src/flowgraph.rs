//! The control-flow graph: predecessors and successors of every block,
//! derived from each block's terminator.

use crate::ir::{Block, Function, Inst};
use retarget_entity::SecondaryMap;
use smallvec::SmallVec;

/// One edge into a block: the instruction that branches here, and the block
/// it branches from.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BlockPredecessor {
    pub block: Block,
    pub inst: Inst,
}

impl BlockPredecessor {
    pub fn new(block: Block, inst: Inst) -> Self {
        Self { block, inst }
    }
}

#[derive(Clone, Default)]
struct BlockData {
    predecessors: SmallVec<[BlockPredecessor; 4]>,
    successors: SmallVec<[Block; 2]>,
}

/// The control-flow graph, computed from a function's layout and terminator
/// instructions. Stale after any change to branch targets or the layout;
/// callers must call [`Self::compute`] again after such a change.
#[derive(Default)]
pub struct ControlFlowGraph {
    data: SecondaryMap<Block, BlockData>,
    valid: bool,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(func: &Function) -> Self {
        let mut cfg = Self::new();
        cfg.compute(func);
        cfg
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.valid = false;
    }

    /// Recompute predecessors and successors for every block by scanning
    /// each block's terminator exactly once.
    pub fn compute(&mut self, func: &Function) {
        self.clear();
        for block in func.layout.blocks() {
            let terminator = func
                .layout
                .last_inst(block)
                .expect("every laid-out block must have a terminator");
            for dest in func.dfg.branch_destinations(terminator) {
                self.add_edge(block, terminator, dest.block);
            }
        }
        self.valid = true;
    }

    fn add_edge(&mut self, from: Block, inst: Inst, to: Block) {
        self.data[from].successors.push(to);
        self.data[to]
            .predecessors
            .push(BlockPredecessor::new(from, inst));
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn pred_iter(&self, block: Block) -> impl Iterator<Item = BlockPredecessor> + '_ {
        self.data[block].predecessors.iter().copied()
    }

    pub fn succ_iter(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data[block].successors.iter().copied()
    }

    pub fn pred_count(&self, block: Block) -> usize {
        self.data[block].predecessors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, InstBuilder, Signature, Type};

    #[test]
    fn diamond_cfg() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("diamond", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let b2 = func.create_block();
        let b3 = func.create_block();

        let mut pos = crate::ir::Cursor::at_top(&mut func, b0);
        let v0 = pos.ins().iconst(Type::I32, 1);
        pos.ins().brif(v0, b1, &[], b2, &[]);

        pos.insert_block(b1);
        pos.ins().jump(b3, &[]);

        pos.insert_block(b2);
        pos.ins().jump(b3, &[]);

        pos.insert_block(b3);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        assert_eq!(cfg.succ_iter(b0).collect::<Vec<_>>(), vec![b1, b2]);
        assert_eq!(cfg.pred_count(b3), 2);
    }
}

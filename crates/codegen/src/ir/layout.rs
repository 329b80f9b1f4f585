//! Function layout: the order of blocks, and the order of instructions
//! within each block.
//!
//! This is an intrusive doubly-linked list over [`Block`] and [`Inst`]
//! entities, kept separate from the [`DataFlowGraph`](super::DataFlowGraph)
//! so that reordering code (block sinking, instruction scheduling) never
//! needs to touch operand data, and vice versa.

use super::entities::{Block, Inst};
use retarget_entity::SecondaryMap;

#[derive(Clone, Copy, Default)]
struct BlockNode {
    prev: Option<Block>,
    next: Option<Block>,
    first_inst: Option<Inst>,
    last_inst: Option<Inst>,
}

#[derive(Clone, Copy, Default)]
struct InstNode {
    block: Option<Block>,
    prev: Option<Inst>,
    next: Option<Inst>,
}

/// The program order of blocks and instructions.
#[derive(Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<Block, BlockNode>,
    insts: SecondaryMap<Inst, InstNode>,
    first_block: Option<Block>,
    last_block: Option<Block>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.insts.clear();
        self.first_block = None;
        self.last_block = None;
    }

    /// Is `block` currently part of the layout?
    pub fn is_block_inserted(&self, block: Block) -> bool {
        Some(block) == self.first_block || self.blocks.get(block).prev.is_some()
            || self.blocks.get(block).next.is_some()
    }

    /// Append `block` to the end of the layout.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(!self.is_block_inserted(block));
        {
            let node = self.blocks.get_mut(block);
            node.prev = self.last_block;
            node.next = None;
        }
        if let Some(last) = self.last_block {
            self.blocks.get_mut(last).next = Some(block);
        } else {
            self.first_block = Some(block);
        }
        self.last_block = Some(block);
    }

    pub fn first_block(&self) -> Option<Block> {
        self.first_block
    }

    pub fn last_block(&self) -> Option<Block> {
        self.last_block
    }

    pub fn next_block(&self, block: Block) -> Option<Block> {
        self.blocks.get(block).next
    }

    pub fn prev_block(&self, block: Block) -> Option<Block> {
        self.blocks.get(block).prev
    }

    /// Iterate over blocks in layout order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            layout: self,
            next: self.first_block,
        }
    }

    /// Append `inst` to the end of `block`'s instruction list.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(self.insts.get(inst).block.is_none());
        let last = self.blocks.get(block).last_inst;
        {
            let node = self.insts.get_mut(inst);
            node.block = Some(block);
            node.prev = last;
            node.next = None;
        }
        if let Some(last) = last {
            self.insts.get_mut(last).next = Some(inst);
        } else {
            self.blocks.get_mut(block).first_inst = Some(inst);
        }
        self.blocks.get_mut(block).last_inst = Some(inst);
    }

    /// Insert `inst` immediately before `before`, in `before`'s block.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        let block = self.inst_block(before).expect("`before` is not inserted");
        let prev = self.insts.get(before).prev;
        {
            let node = self.insts.get_mut(inst);
            node.block = Some(block);
            node.prev = prev;
            node.next = Some(before);
        }
        self.insts.get_mut(before).prev = Some(inst);
        match prev {
            Some(p) => self.insts.get_mut(p).next = Some(inst),
            None => self.blocks.get_mut(block).first_inst = Some(inst),
        }
    }

    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.insts.get(inst).block
    }

    pub fn next_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts.get(inst).next
    }

    pub fn prev_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts.get(inst).prev
    }

    pub fn first_inst(&self, block: Block) -> Option<Inst> {
        self.blocks.get(block).first_inst
    }

    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.blocks.get(block).last_inst
    }

    /// Iterate over a block's instructions in layout order.
    pub fn block_insts(&self, block: Block) -> Insts<'_> {
        Insts {
            layout: self,
            next: self.first_inst(block),
        }
    }
}

/// Iterator over blocks in layout order.
pub struct Blocks<'a> {
    layout: &'a Layout,
    next: Option<Block>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let block = self.next?;
        self.next = self.layout.next_block(block);
        Some(block)
    }
}

/// Iterator over a block's instructions in layout order.
pub struct Insts<'a> {
    layout: &'a Layout,
    next: Option<Inst>,
}

impl<'a> Iterator for Insts<'a> {
    type Item = Inst;

    fn next(&mut self) -> Option<Inst> {
        let inst = self.next?;
        self.next = self.layout.next_inst(inst);
        Some(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retarget_entity::EntityRef;

    #[test]
    fn blocks_in_append_order() {
        let mut layout = Layout::new();
        let b0 = Block::new(0);
        let b1 = Block::new(1);
        let b2 = Block::new(2);
        layout.append_block(b0);
        layout.append_block(b1);
        layout.append_block(b2);
        assert_eq!(layout.blocks().collect::<Vec<_>>(), vec![b0, b1, b2]);
    }

    #[test]
    fn insts_in_block_order() {
        let mut layout = Layout::new();
        let b0 = Block::new(0);
        layout.append_block(b0);
        let i0 = Inst::new(0);
        let i1 = Inst::new(1);
        let i2 = Inst::new(2);
        layout.append_inst(i0, b0);
        layout.append_inst(i2, b0);
        layout.insert_inst_before(i1, i2);
        assert_eq!(layout.block_insts(b0).collect::<Vec<_>>(), vec![i0, i1, i2]);
        assert_eq!(layout.inst_block(i1), Some(b0));
    }
}

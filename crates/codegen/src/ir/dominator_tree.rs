//! Dominator tree, computed from a function's control-flow graph.
//!
//! Unlike a textbook presentation this is block-granular only: since every
//! block in this IR ends in exactly one terminator (no fallthrough between
//! basic blocks within a block, no jump tables), tracking dominance at
//! instruction precision would add nothing a caller couldn't get by also
//! asking which block an instruction lives in.

use super::entities::Block;
use super::function::Function;
use crate::flowgraph::ControlFlowGraph;
use retarget_entity::SecondaryMap;

/// Reverse post-order numbers are assigned as multiples of `STRIDE`, leaving
/// room to patch the tree locally without renumbering everything.
const STRIDE: u32 = 4;

#[derive(Clone, Copy, Default)]
struct DomNode {
    rpo_number: u32,
    idom: Option<Block>,
}

/// The dominator tree for a single function's control-flow graph.
pub struct DominatorTree {
    nodes: SecondaryMap<Block, DomNode>,
    postorder: Vec<Block>,
    valid: bool,
}

impl DominatorTree {
    pub fn new() -> Self {
        Self {
            nodes: SecondaryMap::new(),
            postorder: Vec::new(),
            valid: false,
        }
    }

    pub fn with_function(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let mut dt = Self::new();
        dt.compute(func, cfg);
        dt
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.postorder.clear();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Blocks reachable from the entry, in CFG post-order.
    pub fn cfg_postorder(&self) -> &[Block] {
        debug_assert!(self.valid);
        &self.postorder
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.nodes.get(block).rpo_number != 0
    }

    pub fn idom(&self, block: Block) -> Option<Block> {
        self.nodes.get(block).idom
    }

    /// Recompute the post-order and dominator tree from scratch.
    pub fn compute(&mut self, func: &Function, cfg: &ControlFlowGraph) {
        debug_assert!(cfg.is_valid());
        self.clear();
        let entry = match func.layout.first_block() {
            Some(b) => b,
            None => {
                self.valid = true;
                return;
            }
        };
        self.compute_postorder(entry, cfg);
        self.compute_idoms(entry, cfg);
        self.valid = true;
    }

    fn compute_postorder(&mut self, entry: Block, cfg: &ControlFlowGraph) {
        enum Work {
            Enter(Block),
            Leave(Block),
        }
        let mut seen = SecondaryMap::<Block, bool>::new();
        let mut stack = vec![Work::Enter(entry)];
        seen.set(entry, true);
        while let Some(item) = stack.pop() {
            match item {
                Work::Enter(block) => {
                    stack.push(Work::Leave(block));
                    for succ in cfg.succ_iter(block) {
                        if !seen.get(succ) {
                            seen.set(succ, true);
                            stack.push(Work::Enter(succ));
                        }
                    }
                }
                Work::Leave(block) => self.postorder.push(block),
            }
        }
    }

    /// Keith Cooper, Timothy Harvey, and Ken Kennedy's "A Simple, Fast
    /// Dominance Algorithm": assign each reachable block a reverse
    /// post-order number, then iterate the `idom` estimate to a fixed point.
    fn compute_idoms(&mut self, entry: Block, cfg: &ControlFlowGraph) {
        let rpo: Vec<Block> = self.postorder.iter().rev().copied().collect();
        for (i, &block) in rpo.iter().enumerate() {
            self.nodes[block].rpo_number = (i as u32 + 1) * STRIDE;
        }
        self.nodes[entry].idom = None;

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom = None;
                for pred in cfg.pred_iter(block) {
                    if self.nodes.get(pred.block).rpo_number == 0 {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred.block,
                        Some(other) => self.intersect(other, pred.block),
                    });
                }
                if self.nodes[block].idom != new_idom {
                    self.nodes[block].idom = new_idom;
                    changed = true;
                }
            }
        }
    }

    fn intersect(&self, mut a: Block, mut b: Block) -> Block {
        loop {
            let rpo_a = self.nodes.get(a).rpo_number;
            let rpo_b = self.nodes.get(b).rpo_number;
            match rpo_a.cmp(&rpo_b) {
                core::cmp::Ordering::Greater => {
                    a = self.nodes.get(a).idom.expect("walked past the entry block");
                }
                core::cmp::Ordering::Less => {
                    b = self.nodes.get(b).idom.expect("walked past the entry block");
                }
                core::cmp::Ordering::Equal => return a,
            }
        }
    }

    /// Does `a` dominate `b`? Every block dominates itself; an unreachable
    /// block dominates nothing but itself.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        if a == b {
            return true;
        }
        if !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        while let Some(idom) = self.idom(cur) {
            if idom == a {
                return true;
            }
            cur = idom;
        }
        false
    }
}

impl Default for DominatorTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Cursor, Signature, Type};

    #[test]
    fn diamond_dominance() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("diamond", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let b2 = func.create_block();
        let b3 = func.create_block();

        let mut pos = Cursor::at_top(&mut func, b0);
        let v0 = pos.ins().iconst(Type::I32, 1);
        pos.ins().brif(v0, b1, &[], b2, &[]);
        pos.insert_block(b1);
        pos.ins().jump(b3, &[]);
        pos.insert_block(b2);
        pos.ins().jump(b3, &[]);
        pos.insert_block(b3);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        let dt = DominatorTree::with_function(&func, &cfg);

        assert_eq!(dt.idom(b0), None);
        assert_eq!(dt.idom(b1), Some(b0));
        assert_eq!(dt.idom(b2), Some(b0));
        assert_eq!(dt.idom(b3), Some(b0));
        assert!(dt.dominates(b0, b3));
        assert!(!dt.dominates(b1, b3));
        assert!(!dt.dominates(b2, b3));
    }

    #[test]
    fn straight_line_chain_dominance() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("chain", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let b2 = func.create_block();

        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().jump(b1, &[]);
        pos.insert_block(b1);
        pos.ins().jump(b2, &[]);
        pos.insert_block(b2);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        let dt = DominatorTree::with_function(&func, &cfg);

        assert!(dt.dominates(b0, b2));
        assert!(dt.dominates(b1, b2));
        assert!(!dt.dominates(b2, b0));
    }
}

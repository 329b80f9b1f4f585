//! Natural loop detection, built on top of the dominator tree.
//!
//! A back edge is a CFG edge `u -> v` where `v` dominates `u`. Each back
//! edge identifies a natural loop headed by `v`, whose body is every block
//! that can reach `u` without passing through `v`. Loops that share a header
//! are merged (a header can have more than one back edge); loops nest by
//! body-set containment, and a block's loop level is how many loop bodies
//! contain it.

use super::dominator_tree::DominatorTree;
use super::entities::Block;
use super::function::Function;
use crate::flowgraph::ControlFlowGraph;
use retarget_entity::{entity_impl, PrimaryMap, SecondaryMap};

/// An opaque reference to a natural loop.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Loop(u32);
entity_impl!(Loop, "loop");

struct LoopData {
    header: Block,
    parent: Option<Loop>,
}

/// The natural-loop forest of a function.
pub struct LoopAnalysis {
    loops: PrimaryMap<Loop, LoopData>,
    block_innermost: SecondaryMap<Block, Option<Loop>>,
    valid: bool,
}

impl LoopAnalysis {
    pub fn new() -> Self {
        Self {
            loops: PrimaryMap::new(),
            block_innermost: SecondaryMap::new(),
            valid: false,
        }
    }

    pub fn with_function(func: &Function, cfg: &ControlFlowGraph, domtree: &DominatorTree) -> Self {
        let mut la = Self::new();
        la.compute(func, cfg, domtree);
        la
    }

    pub fn clear(&mut self) {
        self.loops.clear();
        self.block_innermost.clear();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The loop a block belongs to directly, if any (its innermost
    /// enclosing loop).
    pub fn innermost_loop(&self, block: Block) -> Option<Loop> {
        *self.block_innermost.get(block)
    }

    pub fn loop_header(&self, lp: Loop) -> Block {
        self.loops[lp].header
    }

    pub fn loop_parent(&self, lp: Loop) -> Option<Loop> {
        self.loops[lp].parent
    }

    /// Nesting depth of `block`: 0 if it's in no loop, 1 if it's directly in
    /// one loop, and so on for nested loops.
    pub fn loop_level(&self, block: Block) -> u32 {
        let mut level = 0;
        let mut cur = self.innermost_loop(block);
        while let Some(lp) = cur {
            level += 1;
            cur = self.loop_parent(lp);
        }
        level
    }

    pub fn compute(&mut self, func: &Function, cfg: &ControlFlowGraph, domtree: &DominatorTree) {
        self.clear();
        debug_assert!(domtree.is_valid());

        // One loop per distinct header, keyed by block so that multiple
        // back edges to the same header merge into one loop.
        let mut header_loop: SecondaryMap<Block, Option<Loop>> = SecondaryMap::new();

        for &block in domtree.cfg_postorder() {
            for succ in cfg.succ_iter(block) {
                if domtree.dominates(succ, block) {
                    let lp = match header_loop.get(succ) {
                        Some(lp) => *lp,
                        None => None,
                    };
                    let lp = match lp {
                        Some(lp) => lp,
                        None => {
                            let lp = self.loops.push(LoopData {
                                header: succ,
                                parent: None,
                            });
                            header_loop.set(succ, Some(lp));
                            lp
                        }
                    };
                    self.add_to_loop_body(lp, block, cfg, domtree, succ);
                }
            }
        }

        self.assign_nesting();
        self.valid = true;
    }

    /// Walk the CFG backwards from `tail` (the back edge's source) up to
    /// `header`, marking every block found as belonging to `lp`.
    fn add_to_loop_body(
        &mut self,
        lp: Loop,
        tail: Block,
        cfg: &ControlFlowGraph,
        domtree: &DominatorTree,
        header: Block,
    ) {
        let mut worklist = vec![tail];
        let mut in_loop = SecondaryMap::<Block, bool>::new();
        in_loop.set(header, true);
        while let Some(block) = worklist.pop() {
            if *in_loop.get(block) {
                continue;
            }
            in_loop.set(block, true);
            self.mark_block(block, lp, domtree);
            for pred in cfg.pred_iter(block) {
                if domtree.is_reachable(pred.block) {
                    worklist.push(pred.block);
                }
            }
        }
        self.mark_block(header, lp, domtree);
    }

    /// Record that `block` lies in loop `lp`'s body, keeping whichever of
    /// the two candidate loops is nested more deeply when `block` was
    /// already claimed by another loop (discovered via a different back
    /// edge). Nesting is decided by dominance between the two loops'
    /// headers: the loop whose header is dominated by the other's is the
    /// inner one.
    fn mark_block(&mut self, block: Block, lp: Loop, domtree: &DominatorTree) {
        match *self.block_innermost.get(block) {
            None => self.block_innermost.set(block, Some(lp)),
            Some(existing) if existing != lp => {
                let existing_header = self.loops[existing].header;
                let lp_header = self.loops[lp].header;
                if domtree.dominates(existing_header, lp_header) {
                    self.block_innermost.set(block, Some(lp));
                }
                // Otherwise `existing` is already the inner loop (or the two
                // loops are unrelated, e.g. an irreducible CFG); keep it.
            }
            _ => {}
        }
    }

    /// A loop's parent is whichever other loop's body contains this loop's
    /// header, which [`Self::mark_block`] has already resolved down to the
    /// innermost candidate in `block_innermost`.
    fn assign_nesting(&mut self) {
        let headers: Vec<(Loop, Block)> = self
            .loops
            .iter()
            .map(|(lp, data)| (lp, data.header))
            .collect();
        for (lp, header) in headers {
            let enclosing = match *self.block_innermost.get(header) {
                Some(inner) if inner != lp => Some(inner),
                _ => None,
            };
            self.loops[lp].parent = enclosing;
        }
    }
}

impl Default for LoopAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Cursor, Signature, Type};

    #[test]
    fn single_loop_level() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("count_loop", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let b2 = func.create_block();

        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().jump(b1, &[]);

        pos.insert_block(b1);
        let v0 = pos.ins().iconst(Type::I32, 1);
        pos.ins().brif(v0, b1, &[], b2, &[]);

        pos.insert_block(b2);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        let domtree = DominatorTree::with_function(&func, &cfg);
        let loops = LoopAnalysis::with_function(&func, &cfg, &domtree);

        assert_eq!(loops.loop_level(b0), 0);
        assert_eq!(loops.loop_level(b1), 1);
        assert_eq!(loops.loop_level(b2), 0);
        assert_eq!(loops.loop_header(loops.innermost_loop(b1).unwrap()), b1);
    }

    #[test]
    fn nested_loop_levels_and_parent() {
        // b0 -> b1 (outer header) -> b2 (inner header) -> b3 -> b2 (inner
        // back edge) / b3 -> b1 (outer back edge, taken once inner exits) ->
        // b4 (exit).
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("nested_loop", sig);
        let b0 = func.create_block();
        let b1 = func.create_block();
        let b2 = func.create_block();
        let b3 = func.create_block();
        let b4 = func.create_block();

        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().jump(b1, &[]);

        pos.insert_block(b1);
        pos.ins().jump(b2, &[]);

        pos.insert_block(b2);
        let v0 = pos.ins().iconst(Type::I32, 1);
        pos.ins().brif(v0, b3, &[], b2, &[]);

        pos.insert_block(b3);
        let v1 = pos.ins().iconst(Type::I32, 1);
        pos.ins().brif(v1, b1, &[], b4, &[]);

        pos.insert_block(b4);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        let domtree = DominatorTree::with_function(&func, &cfg);
        let loops = LoopAnalysis::with_function(&func, &cfg, &domtree);

        assert_eq!(loops.loop_level(b0), 0);
        assert_eq!(loops.loop_level(b1), 1);
        assert_eq!(loops.loop_level(b2), 2);
        assert_eq!(loops.loop_level(b3), 2);
        assert_eq!(loops.loop_level(b4), 0);

        let inner = loops.innermost_loop(b2).unwrap();
        let outer = loops.innermost_loop(b1).unwrap();
        assert_ne!(inner, outer);
        assert_eq!(loops.loop_header(inner), b2);
        assert_eq!(loops.loop_header(outer), b1);
        assert_eq!(loops.loop_parent(inner), Some(outer));
        assert_eq!(loops.loop_parent(outer), None);
    }

    #[test]
    fn straight_line_has_no_loops() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("straight", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        pos.ins().return_(&[]);

        let cfg = ControlFlowGraph::with_function(&func);
        let domtree = DominatorTree::with_function(&func, &cfg);
        let loops = LoopAnalysis::with_function(&func, &cfg, &domtree);
        assert_eq!(loops.loop_level(b0), 0);
    }
}

//! Resolving a parallel copy: regalloc's linear-scan pass and block-boundary
//! reconciliation both need to move a set of values between locations
//! *simultaneously* (block params arriving from different predecessors in
//! different registers, or a spill reload racing a register-to-register
//! move). This turns such a set into a legal sequence of ordinary moves,
//! breaking cycles with a scratch location.

use crate::machinst::Allocation;
use std::vec::Vec;

/// One simultaneous move: `src` must end up in `dst`. A `ParallelCopy` is a
/// set of these that must all appear to happen at once (every `src` is read
/// using the *pre-copy* values, even if some `dst` aliases another move's
/// `src`).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Move {
    pub dst: Allocation,
    pub src: Allocation,
}

/// Turn a parallel copy into a sequential list of moves that produces the
/// same result, introducing at most one scratch-register move per
/// maximal cycle in the move graph.
///
/// Standard algorithm (as in SSA-based register allocators): treat the
/// copy set as a graph with an edge `src -> dst` per move. Repeatedly emit
/// any move whose `dst` is not the `src` of another not-yet-emitted move
/// (a "ready" move); this drains every acyclic part of the graph. What's
/// left is a union of simple cycles; break each by routing its first move
/// through `scratch` instead of directly.
pub fn resolve(moves: &[Move], scratch: Allocation) -> Vec<Move> {
    let mut pending: Vec<Move> = moves.iter().copied().filter(|m| m.dst != m.src).collect();
    let mut out = Vec::new();

    loop {
        let ready_idx = pending.iter().position(|m| {
            !pending.iter().any(|other| other.src == m.dst && other.dst != m.dst)
        });
        match ready_idx {
            Some(i) => {
                out.push(pending.remove(i));
            }
            None => break,
        }
    }

    // Anything left is entirely cycles. Repeatedly peel one off: route its
    // first move through scratch, freeing its destination so the rest of
    // that cycle becomes a chain of ready moves.
    while let Some(first) = pending.first().copied() {
        out.push(Move {
            dst: scratch,
            src: first.src,
        });
        // Replace every remaining move whose src was first.src's dst... the
        // cycle is: first.src -> first.dst -> ... -> first.src. Once
        // `first.dst`'s incoming edge is satisfied from scratch instead,
        // the rest of the chain drains as ready moves.
        pending.remove(0);
        loop {
            let ready_idx = pending.iter().position(|m| {
                !pending.iter().any(|other| other.src == m.dst && other.dst != m.dst)
            });
            match ready_idx {
                Some(i) => out.push(pending.remove(i)),
                None => break,
            }
        }
        out.push(Move {
            dst: first.dst,
            src: scratch,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::{PReg, RegClass};

    fn reg(i: u8) -> Allocation {
        Allocation::Reg(PReg::new(i, RegClass::Int))
    }

    #[test]
    fn acyclic_moves_are_emitted_in_dependency_order() {
        // r0 -> r1, r1 -> r2 (a chain, not a cycle): must emit r1->r2 before r0->r1
        let moves = vec![
            Move { dst: reg(1), src: reg(0) },
            Move { dst: reg(2), src: reg(1) },
        ];
        let resolved = resolve(&moves, reg(9));
        let pos = |m: &Move| resolved.iter().position(|r| r == m).unwrap();
        assert!(pos(&moves[1]) < pos(&moves[0]));
    }

    #[test]
    fn two_cycle_is_broken_with_scratch() {
        // r0 <-> r1 swap
        let moves = vec![
            Move { dst: reg(1), src: reg(0) },
            Move { dst: reg(0), src: reg(1) },
        ];
        let resolved = resolve(&moves, reg(9));
        // every destination register ends up holding the other's original value;
        // simplest check: a move into scratch and a move out of scratch both occur
        assert!(resolved.iter().any(|m| m.dst == reg(9)));
        assert!(resolved.iter().any(|m| m.src == reg(9)));
    }

    #[test]
    fn self_moves_are_dropped() {
        let moves = vec![Move { dst: reg(0), src: reg(0) }];
        let resolved = resolve(&moves, reg(9));
        assert!(resolved.is_empty());
    }
}

//! Register allocation: liveness analysis, the interference graph built
//! from it, a linear-scan allocator, parallel-copy resolution for the
//! moves allocation implies at block boundaries, and a debug-only checker
//! that replays the result to confirm it's sound.

mod checker;
mod interference;
mod linear_scan;
mod liveness;
mod parallel_copy;
mod pipeline;

pub use checker::{check, CheckedInst, CheckerViolation};
pub use interference::InterferenceGraph;
pub use linear_scan::{allocate, AllocatorInput, AllocatorOutput};
pub use liveness::{LiveRange, Liveness, ProgPoint};
pub use parallel_copy::{resolve as resolve_parallel_copy, Move};
pub use pipeline::allocate_vcode;

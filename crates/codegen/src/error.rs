//! The crate-level error type: one variant per §7 error kind, each carrying
//! whatever diagnostics it needs. Every fallible, function-granular API in
//! this crate returns `Result<T, CodegenError>`; internal invariant
//! violations (a bad entity index, an encoder reaching an unreachable
//! state) panic instead, since those indicate a bug in this crate rather
//! than in caller input.

use crate::ir::{Severity, VerifierError};
use crate::isle::RuleConflict;
use crate::regalloc::CheckerViolation;
use std::vec::Vec;
use thiserror::Error;

/// Everything that can make a single function's compile fail.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// The IR verifier rejected the function; `.0` is every diagnostic it
    /// found (fatal and warning).
    #[error("function failed verification ({} errors)", count_fatal(.0))]
    Verification(Vec<VerifierError>),

    /// A backend's lowering rule set had two same-priority rules that
    /// impose contradictory constraints on the same binding. Building the
    /// backend (not compiling a function) is what surfaces this.
    #[error("conflicting lowering rules: {0}")]
    PatternConflict(RuleConflict),

    /// An instruction's encoder was asked to materialize an immediate (or
    /// offset) that doesn't fit the chosen opcode form. This is always a
    /// lowering bug: the encoder must never be reached with an illegal
    /// input.
    #[error("encoder range error: {0}")]
    EncoderRange(std::string::String),

    /// The debug-only allocation checker found the register allocator's
    /// output unsound (wrong class, stale value, or a stack-to-stack move
    /// with no scratch).
    #[error("register allocation check failed: {0}")]
    AllocationCheck(CheckerViolation),

    /// An allocating API ran out of memory. The only error kind a caller
    /// can meaningfully retry.
    #[error("out of memory")]
    OutOfMemory,
}

fn count_fatal(errors: &[VerifierError]) -> usize {
    errors.iter().filter(|e| e.severity == Severity::Fatal).count()
}

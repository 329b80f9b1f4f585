//! Target backends: each implements lowering from the SSA IR into its own
//! `MachInst`, and encoding of that `MachInst` into bytes plus relocations.

pub mod aarch64;
pub mod x64;

use crate::error::CodegenError;
use crate::ir::Function;
use crate::machinst::{MachReloc, RegClass};
use crate::regalloc::CheckerViolation;
use crate::settings::Flags;
use std::vec::Vec;

/// What a completed, allocated, emitted function produces.
pub struct CompiledCode {
    pub code: Vec<u8>,
    pub relocs: Vec<MachReloc>,
}

/// The common entry point every backend exposes to the driver
/// (`retarget-module`'s `Context`): take a verified (and, if enabled,
/// peephole-optimized) function and produce machine code for it.
pub trait Isa {
    fn name(&self) -> &'static str;

    /// How many hardware registers this target has in `class`, used to size
    /// the allocator's register pool.
    fn num_regs(&self, class: RegClass) -> usize;

    fn compile(&self, func: &Function, flags: &Flags) -> Result<CompiledCode, CodegenError>;
}

pub(crate) fn checker_result(
    result: Result<(), CheckerViolation>,
) -> Result<(), CodegenError> {
    result.map_err(CodegenError::AllocationCheck)
}

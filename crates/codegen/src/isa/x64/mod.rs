//! The x86-64 System V backend: lowering, a small machine-instruction
//! vocabulary, and byte-level emission, wired together behind the [`Isa`]
//! trait so `retarget-module`'s driver can target it without knowing any of
//! its internals.

mod emit;
mod inst;
mod lower;
mod regs;

pub use inst::Inst;

use super::{checker_result, CompiledCode, Isa};
use crate::error::CodegenError;
use crate::ir::{verify_function, Function};
use crate::machinst::{MachBuffer, RegClass};
use crate::regalloc::allocate_vcode;
use crate::settings::Flags;
use rustc_hash::FxHashMap;
use std::vec::Vec;

#[derive(Copy, Clone, Debug, Default)]
pub struct X64Backend;

impl Isa for X64Backend {
    fn name(&self) -> &'static str {
        "x86_64"
    }

    fn num_regs(&self, class: RegClass) -> usize {
        match class {
            RegClass::Int => regs::allocatable_int().len(),
            RegClass::Float => 1,
        }
    }

    fn compile(&self, func: &Function, flags: &Flags) -> Result<CompiledCode, CodegenError> {
        log::debug!("x86_64: compiling {}", func.name);
        if flags.verify() {
            let errors = verify_function(func);
            if crate::ir::has_fatal_errors(&errors) {
                return Err(CodegenError::Verification(errors));
            }
        }

        let mut func = func.clone();
        if flags.optimize() {
            crate::ir::run_peephole(&mut func);
        }

        let mut vcode = lower::lower(&func);

        let mut pool = FxHashMap::default();
        pool.insert(RegClass::Int, regs::allocatable_int());
        pool.insert(RegClass::Float, vec![regs::XMM0]);

        let result = allocate_vcode(&mut vcode, &pool, flags.verify());
        checker_result(result.map(|_| ()))?;

        let mut buf = MachBuffer::new();
        let labels: Vec<_> = vcode.blocks.iter().map(|_| buf.get_label()).collect();
        for (block, label) in vcode.blocks.iter().zip(&labels) {
            let _ = block.label;
            buf.bind_label(*label);
            for (ssa_inst, inst) in &block.insts {
                buf.record_ssa_inst(*ssa_inst);
                emit::emit(&mut buf, inst);
            }
        }
        let (code, relocs, _inst_offsets) = buf.finish();
        log::debug!("x86_64: emitted {} byte(s), {} relocation(s)", code.len(), relocs.len());

        Ok(CompiledCode { code, relocs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Cursor, Function, Signature, Type};
    use crate::settings::Builder;

    #[test]
    fn compiles_a_function_that_adds_two_constants_and_returns() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("add_two_consts", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let a = pos.ins().iconst(Type::I64, 2);
        let b = pos.ins().iconst(Type::I64, 3);
        let sum = pos.ins().iadd(a, b);
        pos.ins().return_(&[sum]);

        let flags = Builder::new().finish();
        let backend = X64Backend;
        let compiled = backend.compile(&func, &flags).expect("compile succeeds");
        assert!(!compiled.code.is_empty());
        assert_eq!(*compiled.code.last().unwrap(), 0xC3);
    }
}

//! The driver: selects a target backend, holds the compile configuration
//! every function in a module shares, and runs the verify → optimize →
//! lower → allocate → emit pipeline for one function at a time.

use crate::error::ModuleError;
use crate::ids::FuncId;
use crate::symbol::SymbolTable;
use retarget_codegen::ir::{CallConv, Function};
use retarget_codegen::isa::{self, Isa};
use retarget_codegen::settings::{Builder as FlagsBuilder, Flags, OptLevel};
use std::boxed::Box;
use target_lexicon::{Architecture, OperatingSystem};

fn backend_for(arch: Architecture) -> Box<dyn Isa> {
    match arch {
        Architecture::Aarch64(_) => Box::new(isa::aarch64::Aarch64Backend),
        _ => Box::new(isa::x64::X64Backend),
    }
}

/// Builds a [`Context`] one knob at a time: which target to compile for,
/// how aggressively to optimize, which calling convention new functions
/// default to, and whether to run the verifier and peephole pass.
pub struct ContextBuilder {
    arch: Architecture,
    os: OperatingSystem,
    flags: FlagsBuilder,
    call_conv_overridden: bool,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            arch: Architecture::X86_64,
            os: OperatingSystem::Linux,
            flags: FlagsBuilder::new(),
            call_conv_overridden: false,
        }
    }

    /// Select the target architecture and OS; also sets the default
    /// calling convention to that platform's standard ABI, unless
    /// [`Self::call_conv`] has already overridden it.
    #[must_use]
    pub fn target(mut self, arch: Architecture, os: OperatingSystem) -> Self {
        self.arch = arch;
        self.os = os;
        if !self.call_conv_overridden {
            self.flags = self.flags.call_conv(CallConv::triple_default(os, arch));
        }
        self
    }

    #[must_use]
    pub fn opt_level(mut self, level: OptLevel) -> Self {
        self.flags = self.flags.opt_level(level);
        self
    }

    #[must_use]
    pub fn call_conv(mut self, cc: CallConv) -> Self {
        self.call_conv_overridden = true;
        self.flags = self.flags.call_conv(cc);
        self
    }

    #[must_use]
    pub fn verification(mut self, enable: bool) -> Self {
        self.flags = self.flags.verify(enable);
        self
    }

    #[must_use]
    pub fn optimization(mut self, enable: bool) -> Self {
        self.flags = self.flags.optimize(enable);
        self
    }

    pub fn build(self) -> Context {
        Context {
            isa: backend_for(self.arch),
            flags: self.flags.finish(),
            symbols: SymbolTable::new(),
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One target, one configuration, one symbol table. Compiles functions
/// one at a time; nothing here is shared across `Context`s, so a caller
/// wanting to compile in parallel just uses one `Context` per thread.
pub struct Context {
    isa: Box<dyn Isa>,
    flags: Flags,
    symbols: SymbolTable,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Run `func` through this context's backend: verify (if enabled),
    /// peephole-optimize (if enabled), lower, allocate, and emit. Records
    /// the resulting size, offset-within-itself (always 0; a linker
    /// assigns module-wide offsets), and relocations against `id` in this
    /// context's symbol table, and returns the same information to the
    /// caller.
    pub fn compile_function(
        &mut self,
        id: FuncId,
        func: &mut Function,
    ) -> Result<isa::CompiledCode, ModuleError> {
        if self.symbols.get_func(id).is_none() {
            return Err(ModuleError::NoSuchFunc(id));
        }
        log::debug!("compiling {id} on {}", self.isa.name());
        let compiled = self.isa.compile(func, &self.flags)?;
        self.symbols
            .define_func(id, compiled.code.len() as u32, 0, compiled.relocs.clone())?;
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Linkage;
    use retarget_codegen::ir::{Cursor, Signature, Type};
    use target_lexicon::{Architecture, OperatingSystem};

    #[test]
    fn compiling_a_declared_function_records_its_size_and_offset() {
        let mut ctx = Context::builder()
            .target(Architecture::X86_64, OperatingSystem::Linux)
            .build();
        let sig = Signature::new(ctx.flags().default_call_conv());
        let id = ctx.symbols_mut().declare_func("add", Linkage::Export, &sig).unwrap();

        let mut func = Function::new("add", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let a = pos.ins().iconst(Type::I64, 2);
        let b = pos.ins().iconst(Type::I64, 3);
        let sum = pos.ins().iadd(a, b);
        pos.ins().return_(&[sum]);

        let compiled = ctx.compile_function(id, &mut func).expect("compiles");
        assert!(!compiled.code.is_empty());
        let decl = ctx.symbols().get_func(id).unwrap();
        assert_eq!(decl.size, Some(compiled.code.len() as u32));
        assert_eq!(decl.offset, Some(0));
    }

    #[test]
    fn aarch64_target_defaults_to_aapcs64() {
        let ctx = Context::builder()
            .target(Architecture::Aarch64(target_lexicon::Aarch64Architecture::Aarch64), OperatingSystem::Linux)
            .build();
        assert_eq!(ctx.flags().default_call_conv(), CallConv::Aapcs64);
    }
}

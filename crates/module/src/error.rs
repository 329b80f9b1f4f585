//! Errors a `Context` or `SymbolTable` operation can raise, layered over
//! `retarget_codegen::CodegenError` for failures that happen inside a
//! function's own compile pipeline.

use crate::ids::{DataId, FuncId};
use retarget_codegen::CodegenError;
use std::string::String;
use thiserror::Error;

/// Everything that can go wrong declaring, looking up, or compiling against
/// a `SymbolTable`.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A name was declared twice in the same table with incompatible
    /// linkage or kind (function vs. data).
    #[error("symbol `{0}` already declared with a different signature")]
    IncompatibleDeclaration(String),

    /// A function or data object was referenced (e.g. by a relocation)
    /// before it was declared.
    #[error("symbol `{0}` was not declared in this table")]
    Undeclared(String),

    /// `compile_function` was called against a `FuncId` this table never
    /// declared.
    #[error("no such function id: {0}")]
    NoSuchFunc(FuncId),

    /// A data object reference (by id) that this table never declared.
    #[error("no such data id: {0}")]
    NoSuchData(DataId),

    /// The function itself failed to compile.
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

//! Opaque references to the functions and data objects a [`crate::SymbolTable`]
//! declares, distinct from the codegen-level `FuncRef`/`GlobalValue` a single
//! function's own preamble uses to refer to things it imports.

use retarget_entity::entity_impl;

/// A reference to a function declared in a `SymbolTable`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId, "func");

/// A reference to a data object declared in a `SymbolTable`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(u32);
entity_impl!(DataId, "data");

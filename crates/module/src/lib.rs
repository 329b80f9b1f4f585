//! A driver on top of `retarget-codegen`: a [`SymbolTable`] that declares
//! functions and data objects and links relocations against them, and a
//! [`Context`] that configures a target and compiles one [`Function`] at a
//! time against it.
//!
//! A `Context` owns no cross-function state beyond its `SymbolTable` and
//! configuration: each call to [`Context::compile_function`] runs the full
//! verify → optimize → lower → allocate → emit pipeline independently, so
//! callers that want to compile functions in parallel simply use one
//! `Context` per thread.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc as std;
#[cfg(feature = "std")]
extern crate std;

mod context;
mod error;
mod ids;
mod symbol;

pub use context::{Context, ContextBuilder};
pub use error::ModuleError;
pub use ids::{DataId, FuncId};
pub use retarget_codegen::machinst::MachReloc as ModuleReloc;
pub use symbol::{DataDeclaration, FuncDeclaration, Linkage, SymbolTable};

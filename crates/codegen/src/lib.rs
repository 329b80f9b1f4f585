//! A retargetable code generator: a single-function SSA intermediate
//! representation, a verifier, a small peephole optimizer, ISLE-style
//! instruction selection, linear-scan register allocation, and x86-64 /
//! AArch64 backends that lower into it and emit machine code plus
//! relocations.
//!
//! This crate compiles one [`ir::Function`] at a time; sequencing many
//! functions into a linked object (symbol tables, cross-function
//! relocations, a `Context` driver) is `retarget-module`'s job, built on
//! top of the [`isa::Isa`] trait this crate exposes.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc as std;
#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod flowgraph;
pub mod ir;
pub mod isa;
pub mod isle;
pub mod machinst;
pub mod regalloc;
pub mod settings;

pub use error::CodegenError;
pub use settings::{Builder, Flags, OptLevel};

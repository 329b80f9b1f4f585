//! A decision-tree compiler and runtime matcher for priority-ordered
//! pattern-matching rules.
//!
//! This crate is the runtime half of an ISLE-style rule system: it takes
//! rules already constructed as data — [`Pattern`] trees built
//! programmatically, not parsed from a textual DSL — and compiles them into
//! a [`DecisionTree`] that a runtime [`interp::matches`] call can walk
//! against a caller-supplied term. The textual front end that would produce
//! `Pattern` values from source files is a different crate's job; nothing
//! here reads files or reports syntax errors.
//!
//! Terms are opaque to this crate: callers implement [`interp::Environment`]
//! to teach the matcher how to destructure their own value representation
//! (an SSA `Value`, say) into variant tags, constants, and sub-fields.

#![forbid(unsafe_code)]

mod binding;
mod pattern;
mod trie;

pub mod interp;

pub use binding::{Binding, BindingId};
pub use pattern::{Constraint, Pattern, PrimType, Rule, RuleSet, SourcePos, Symbol, VarId};
pub use trie::{compile, node_count, DecisionTree};

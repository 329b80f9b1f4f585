//! Entity references used throughout the IR.
//!
//! Instructions refer to other parts of the function — blocks, other
//! instructions' results, stack slots, external functions — through opaque
//! `u32`-sized handles rather than Rust references, so that a `Function` can
//! be built incrementally without fighting the borrow checker and so that
//! the common case of copying an operand around stays a 4-byte `Copy`.

use retarget_entity::entity_impl;
#[cfg(feature = "enable-serde")]
use serde_derive::{Deserialize, Serialize};

/// An opaque reference to a basic block in a [`Function`](super::Function).
///
/// The order blocks are created in is stable but arbitrary; it need not
/// match layout order (see [`Layout`](super::Layout)).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An opaque reference to an SSA value: either a block parameter or the
/// `n`-th result of some instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Value(u32);
entity_impl!(Value, "v");

/// An opaque reference to an instruction. Most instructions also define one
/// or more [`Value`]s, reached through the data-flow graph rather than
/// through `Inst` itself.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// An opaque reference to a stack slot: a chunk of the current frame.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StackSlot(u32);
entity_impl!(StackSlot, "ss");

/// An opaque reference to an external function declared in a function's
/// preamble, used by direct `call` instructions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "fn");

/// An opaque reference to a function [`Signature`](super::Signature)
/// declared in a function's preamble, used by indirect `call_indirect`
/// instructions and by `FuncRef` declarations.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SigRef(u32);
entity_impl!(SigRef, "sig");

/// An opaque reference to a global value: an address computed once and
/// reused, such as the address of a linked symbol.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct GlobalValue(u32);
entity_impl!(GlobalValue, "gv");

/// An opaque reference to a function-local constant pool entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Constant(u32);
entity_impl!(Constant, "const");

/// Either a block parameter or an instruction result: what a [`Value`]
/// ultimately refers to in the data-flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValueDef {
    /// The `num`-th parameter of `Block`.
    Param(Block, u32),
    /// The `num`-th result of `Inst`.
    Result(Inst, u32),
}

impl ValueDef {
    /// The block or instruction that defines the value, whichever applies.
    pub fn num(self) -> u32 {
        match self {
            ValueDef::Param(_, n) | ValueDef::Result(_, n) => n,
        }
    }
}

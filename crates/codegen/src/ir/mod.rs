//! The SSA intermediate representation: types, entities, the instruction
//! set, the data-flow graph, layout, and the control-flow analyses built on
//! top of them.

mod builder;
mod condcodes;
mod dfg;
mod dominator_tree;
mod entities;
mod function;
mod instructions;
mod loop_analysis;
mod peephole;
mod types;
mod verifier;

pub use builder::{Cursor, InstBuilder};
pub use condcodes::{CondCode, FloatCC, IntCC};
pub use dfg::DataFlowGraph;
pub use dominator_tree::DominatorTree;
pub use entities::{Block, Constant, FuncRef, GlobalValue, Inst, SigRef, StackSlot, Value, ValueDef};
pub use function::{CallConv, Function, Signature, StackSlotData};
pub use instructions::{BlockCall, InstructionData, Opcode, ValueList};
pub use loop_analysis::{Loop, LoopAnalysis};
pub use peephole::run as run_peephole;
pub use types::Type;
pub use verifier::{has_fatal_errors, verify_function, Severity, VerifierError, VerifierErrorKind};

//! Instruction opcodes and their operand shapes.

use super::condcodes::{FloatCC, IntCC};
use super::entities::{Block, FuncRef, SigRef, StackSlot, Value};
use super::types::Type;
use retarget_entity::EntityList;
use smallvec::SmallVec;

/// An instruction's operation, independent of its operand shape.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Iconst,
    F32const,
    F64const,
    Iadd,
    Isub,
    Imul,
    Sdiv,
    Udiv,
    Band,
    Bor,
    Bxor,
    Ishl,
    Ushr,
    Sshr,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Icmp,
    Fcmp,
    Jump,
    Brif,
    Call,
    CallIndirect,
    Load,
    Store,
    StackLoad,
    StackStore,
    Return,
    Trap,
    /// Produces nothing and has no effect. Used by the peephole pass to
    /// neutralize an instruction whose result has been rewritten into an
    /// alias of one of its own operands, without disturbing layout or
    /// entity identity.
    Nop,
}

impl Opcode {
    /// Does this opcode end a block (exactly one must appear, as the last
    /// instruction of the block)?
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::Brif | Opcode::Return | Opcode::Trap
        )
    }

    /// Does this opcode branch to one or more other blocks?
    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Brif)
    }

    /// Does this opcode transfer control to another function?
    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call | Opcode::CallIndirect)
    }
}

/// A list of `Value`s shared out of the function's `ValueList` pool, used
/// for instruction arguments and branch destination argument lists.
pub type ValueList = EntityList<Value>;

/// A branch's target block plus the argument list bound to that block's
/// parameters.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockCall {
    pub block: Block,
    pub args: ValueList,
}

/// The operands of one instruction, tagged by shape. Each variant carries
/// exactly the fields that opcode's encoding needs; the opcode itself
/// (needed to disambiguate opcodes that happen to share a shape, like all
/// the binary arithmetic ops) is stored alongside.
#[derive(Clone, Debug)]
pub enum InstructionData {
    Nullary {
        opcode: Opcode,
    },
    UnaryImm {
        opcode: Opcode,
        imm: i64,
    },
    UnaryIeee32 {
        opcode: Opcode,
        imm: u32,
    },
    UnaryIeee64 {
        opcode: Opcode,
        imm: u64,
    },
    Unary {
        opcode: Opcode,
        arg: Value,
    },
    Binary {
        opcode: Opcode,
        args: [Value; 2],
    },
    BinaryImm {
        opcode: Opcode,
        arg: Value,
        imm: i64,
    },
    IntCompare {
        opcode: Opcode,
        cond: IntCC,
        args: [Value; 2],
    },
    FloatCompare {
        opcode: Opcode,
        cond: FloatCC,
        args: [Value; 2],
    },
    Jump {
        opcode: Opcode,
        destination: BlockCall,
    },
    Brif {
        opcode: Opcode,
        arg: Value,
        then: BlockCall,
        else_: BlockCall,
    },
    Call {
        opcode: Opcode,
        func_ref: FuncRef,
        args: ValueList,
    },
    CallIndirect {
        opcode: Opcode,
        sig_ref: SigRef,
        callee: Value,
        args: ValueList,
    },
    Load {
        opcode: Opcode,
        arg: Value,
        offset: i32,
        ty: Type,
    },
    Store {
        opcode: Opcode,
        args: [Value; 2],
        offset: i32,
    },
    StackLoad {
        opcode: Opcode,
        stack_slot: StackSlot,
        offset: i32,
        ty: Type,
    },
    StackStore {
        opcode: Opcode,
        arg: Value,
        stack_slot: StackSlot,
        offset: i32,
    },
    MultiAry {
        opcode: Opcode,
        args: ValueList,
    },
}

impl InstructionData {
    pub fn opcode(&self) -> Opcode {
        match self {
            InstructionData::Nullary { opcode }
            | InstructionData::UnaryImm { opcode, .. }
            | InstructionData::UnaryIeee32 { opcode, .. }
            | InstructionData::UnaryIeee64 { opcode, .. }
            | InstructionData::Unary { opcode, .. }
            | InstructionData::Binary { opcode, .. }
            | InstructionData::BinaryImm { opcode, .. }
            | InstructionData::IntCompare { opcode, .. }
            | InstructionData::FloatCompare { opcode, .. }
            | InstructionData::Jump { opcode, .. }
            | InstructionData::Brif { opcode, .. }
            | InstructionData::Call { opcode, .. }
            | InstructionData::CallIndirect { opcode, .. }
            | InstructionData::Load { opcode, .. }
            | InstructionData::Store { opcode, .. }
            | InstructionData::StackLoad { opcode, .. }
            | InstructionData::StackStore { opcode, .. }
            | InstructionData::MultiAry { opcode, .. } => *opcode,
        }
    }

    /// The blocks this instruction may transfer control to, in encounter
    /// order. Empty for anything that isn't a branch.
    pub fn branch_destinations(&self) -> SmallVec<[&BlockCall; 2]> {
        match self {
            InstructionData::Jump { destination, .. } => {
                let mut v = SmallVec::new();
                v.push(destination);
                v
            }
            InstructionData::Brif { then, else_, .. } => {
                let mut v = SmallVec::new();
                v.push(then);
                v.push(else_);
                v
            }
            _ => SmallVec::new(),
        }
    }
}

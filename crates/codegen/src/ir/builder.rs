//! A cursor-based instruction builder.
//!
//! Callers position a [`Cursor`] at a block and then call [`Cursor::ins`]
//! repeatedly; each call on the returned [`InstBuilder`] appends one
//! instruction to that block and returns whatever values it defines. This
//! mirrors how a lowering or legalization pass actually wants to build code:
//! one block at a time, always appending at the cursor.

use super::condcodes::{FloatCC, IntCC};
use super::entities::{Block, FuncRef, Inst, SigRef, StackSlot, Value};
use super::function::Function;
use super::instructions::{BlockCall, InstructionData, Opcode};
use super::types::Type;
use smallvec::SmallVec;

/// Positions edits within a function: which block new instructions are
/// appended to.
pub struct Cursor<'f> {
    pub func: &'f mut Function,
    block: Option<Block>,
}

impl<'f> Cursor<'f> {
    /// Position at the top of `block`, inserting it into the layout if it
    /// isn't there yet.
    pub fn at_top(func: &'f mut Function, block: Block) -> Self {
        let mut cursor = Self { func, block: None };
        cursor.insert_block(block);
        cursor
    }

    /// Switch to appending into `block`, inserting it into the layout at the
    /// end if it isn't laid out yet.
    pub fn insert_block(&mut self, block: Block) {
        if !self.func.layout.is_block_inserted(block) {
            self.func.layout.append_block(block);
        }
        self.block = Some(block);
    }

    /// Begin building the next instruction in the current block.
    pub fn ins(&mut self) -> InstBuilder<'_, 'f> {
        InstBuilder { cursor: self }
    }

    pub fn current_block(&self) -> Option<Block> {
        self.block
    }
}

/// Appends one instruction at a time to whatever block its [`Cursor`] is
/// positioned at, one method per opcode.
pub struct InstBuilder<'c, 'f> {
    cursor: &'c mut Cursor<'f>,
}

impl<'c, 'f> InstBuilder<'c, 'f> {
    fn append(&mut self, data: InstructionData) -> Inst {
        let inst = self.cursor.func.dfg.make_inst(data);
        let block = self
            .cursor
            .block
            .expect("cursor must be positioned before building instructions");
        self.cursor.func.layout.append_inst(inst, block);
        inst
    }

    fn append_one_result(&mut self, data: InstructionData, ty: Type) -> Value {
        let inst = self.append(data);
        self.cursor.func.dfg.append_result(inst, ty)
    }

    fn block_call(&mut self, block: Block, args: &[Value]) -> BlockCall {
        self.cursor.func.dfg.block_call(block, args)
    }

    fn value_list(&mut self, args: &[Value]) -> retarget_entity::EntityList<Value> {
        retarget_entity::EntityList::from_iter(
            args.iter().copied(),
            self.cursor.func.dfg.value_list_pool_mut(),
        )
    }

    pub fn iconst(&mut self, ty: Type, imm: i64) -> Value {
        self.append_one_result(
            InstructionData::UnaryImm {
                opcode: Opcode::Iconst,
                imm,
            },
            ty,
        )
    }

    pub fn f32const(&mut self, bits: u32) -> Value {
        self.append_one_result(
            InstructionData::UnaryIeee32 {
                opcode: Opcode::F32const,
                imm: bits,
            },
            Type::F32,
        )
    }

    pub fn f64const(&mut self, bits: u64) -> Value {
        self.append_one_result(
            InstructionData::UnaryIeee64 {
                opcode: Opcode::F64const,
                imm: bits,
            },
            Type::F64,
        )
    }

    fn binary(&mut self, opcode: Opcode, a: Value, b: Value) -> Value {
        let ty = self.cursor.func.dfg.value_type(a);
        self.append_one_result(
            InstructionData::Binary {
                opcode,
                args: [a, b],
            },
            ty,
        )
    }

    pub fn iadd(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Iadd, a, b)
    }
    pub fn isub(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Isub, a, b)
    }
    pub fn imul(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Imul, a, b)
    }
    pub fn sdiv(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Sdiv, a, b)
    }
    pub fn udiv(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Udiv, a, b)
    }
    pub fn band(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Band, a, b)
    }
    pub fn bor(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Bor, a, b)
    }
    pub fn bxor(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Bxor, a, b)
    }
    pub fn ishl(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Ishl, a, b)
    }
    pub fn ushr(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Ushr, a, b)
    }
    pub fn sshr(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Sshr, a, b)
    }
    pub fn fadd(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Fadd, a, b)
    }
    pub fn fsub(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Fsub, a, b)
    }
    pub fn fmul(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Fmul, a, b)
    }
    pub fn fdiv(&mut self, a: Value, b: Value) -> Value {
        self.binary(Opcode::Fdiv, a, b)
    }

    pub fn icmp(&mut self, cond: IntCC, a: Value, b: Value) -> Value {
        self.append_one_result(
            InstructionData::IntCompare {
                opcode: Opcode::Icmp,
                cond,
                args: [a, b],
            },
            Type::I8,
        )
    }

    pub fn fcmp(&mut self, cond: FloatCC, a: Value, b: Value) -> Value {
        self.append_one_result(
            InstructionData::FloatCompare {
                opcode: Opcode::Fcmp,
                cond,
                args: [a, b],
            },
            Type::I8,
        )
    }

    pub fn jump(&mut self, block: Block, args: &[Value]) -> Inst {
        let destination = self.block_call(block, args);
        self.append(InstructionData::Jump {
            opcode: Opcode::Jump,
            destination,
        })
    }

    pub fn brif(
        &mut self,
        cond: Value,
        then_block: Block,
        then_args: &[Value],
        else_block: Block,
        else_args: &[Value],
    ) -> Inst {
        let then = self.block_call(then_block, then_args);
        let else_ = self.block_call(else_block, else_args);
        self.append(InstructionData::Brif {
            opcode: Opcode::Brif,
            arg: cond,
            then,
            else_,
        })
    }

    pub fn call(&mut self, func_ref: FuncRef, args: &[Value]) -> SmallVec<[Value; 2]> {
        let sig_ref = self.cursor.func.dfg.ext_func_signature(func_ref);
        let returns = self.cursor.func.dfg.signature(sig_ref).returns.clone();
        let args = self.value_list(args);
        let inst = self.append(InstructionData::Call {
            opcode: Opcode::Call,
            func_ref,
            args,
        });
        returns
            .into_iter()
            .map(|ty| self.cursor.func.dfg.append_result(inst, ty))
            .collect()
    }

    pub fn call_indirect(
        &mut self,
        sig_ref: SigRef,
        callee: Value,
        args: &[Value],
    ) -> SmallVec<[Value; 2]> {
        let returns = self.cursor.func.dfg.signature(sig_ref).returns.clone();
        let args = self.value_list(args);
        let inst = self.append(InstructionData::CallIndirect {
            opcode: Opcode::CallIndirect,
            sig_ref,
            callee,
            args,
        });
        returns
            .into_iter()
            .map(|ty| self.cursor.func.dfg.append_result(inst, ty))
            .collect()
    }

    pub fn load(&mut self, ty: Type, addr: Value, offset: i32) -> Value {
        self.append_one_result(
            InstructionData::Load {
                opcode: Opcode::Load,
                arg: addr,
                offset,
                ty,
            },
            ty,
        )
    }

    pub fn store(&mut self, value: Value, addr: Value, offset: i32) -> Inst {
        self.append(InstructionData::Store {
            opcode: Opcode::Store,
            args: [value, addr],
            offset,
        })
    }

    pub fn stack_load(&mut self, ty: Type, slot: StackSlot, offset: i32) -> Value {
        self.append_one_result(
            InstructionData::StackLoad {
                opcode: Opcode::StackLoad,
                stack_slot: slot,
                offset,
                ty,
            },
            ty,
        )
    }

    pub fn stack_store(&mut self, value: Value, slot: StackSlot, offset: i32) -> Inst {
        self.append(InstructionData::StackStore {
            opcode: Opcode::StackStore,
            arg: value,
            stack_slot: slot,
            offset,
        })
    }

    pub fn return_(&mut self, args: &[Value]) -> Inst {
        let args = self.value_list(args);
        self.append(InstructionData::MultiAry {
            opcode: Opcode::Return,
            args,
        })
    }

    pub fn trap(&mut self) -> Inst {
        self.append(InstructionData::Nullary {
            opcode: Opcode::Trap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Function, Signature};

    #[test]
    fn builds_a_straight_line_function() {
        let sig = Signature::new(CallConv::SystemV);
        let mut func = Function::new("straight_line", sig);
        let b0 = func.create_block();
        let mut pos = Cursor::at_top(&mut func, b0);
        let a = pos.ins().iconst(Type::I32, 1);
        let b = pos.ins().iconst(Type::I32, 2);
        let c = pos.ins().iadd(a, b);
        pos.ins().return_(&[c]);

        assert_eq!(func.layout.block_insts(b0).count(), 4);
        assert_eq!(func.dfg.value_type(c), Type::I32);
    }
}

//! Encoding x86-64 `Inst`s into bytes. Every encoding here is the plain
//! REX+ModRM form (no legacy-mode compatibility, no VEX); this backend only
//! ever targets 64-bit mode.
//!
//! Spilled operands (an `Allocation::Stack` the register allocator
//! couldn't fit in a hardware register) are not re-lowered into
//! memory-operand instruction forms; instead this layer reloads a spilled
//! `Use` into a scratch register before the real instruction and spills a
//! scratch `Def` back afterward. `R11`/`R10` serve as that scratch pair
//! (never handed out by the allocator's pool, see `isa::x64::regs`) — this
//! keeps one encoder path for both the register and spilled cases at the
//! cost of an extra move per spilled operand, which is the usual tradeoff
//! a simple linear-scan backend makes over split live ranges.

use super::inst::{AluOp, Inst, RegOperand};
use super::regs::{R10, R11, RBP};
use crate::ir::IntCC;
use crate::machinst::{Allocation, MachBuffer, PReg, RelocKind, SpillSlot};
use retarget_entity::EntityRef;

/// Stack slots are addressed relative to `rbp`, one 8-byte slot per index,
/// growing downward starting immediately below the saved frame pointer.
fn spill_offset(slot: SpillSlot) -> i32 {
    -8 * (slot.index() as i32 + 1)
}

fn rex(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | ((w as u8) << 3) | ((r as u8) << 2) | ((x as u8) << 1) | (b as u8)
}

fn modrm(md: u8, reg: u8, rm: u8) -> u8 {
    (md << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
}

/// Emit `mov reg64, [rbp + disp]` (a spill reload) or the reverse store.
fn mem_rbp_op(buf: &mut MachBuffer, opcode: u8, reg_field: u8, disp: i32) {
    let reg_high = (reg_field & 0x8) != 0;
    buf.put1(rex(true, reg_high, false, false));
    buf.put1(opcode);
    buf.put1(modrm(0b10, reg_field, RBP.hw_enc()));
    buf.put4_le(disp as u32);
}

fn reload(buf: &mut MachBuffer, scratch: PReg, slot: SpillSlot) {
    mem_rbp_op(buf, 0x8B, scratch.hw_enc(), spill_offset(slot));
}

fn spill(buf: &mut MachBuffer, scratch: PReg, slot: SpillSlot) {
    mem_rbp_op(buf, 0x89, scratch.hw_enc(), spill_offset(slot));
}

/// Resolve an operand to the hardware register the rest of the encoder
/// should use, reloading it from its spill slot into `scratch` first if
/// needed.
fn resolve_use(buf: &mut MachBuffer, op: &RegOperand, scratch: PReg) -> PReg {
    match op.alloc {
        Allocation::Reg(p) => p,
        Allocation::Stack(slot) => {
            reload(buf, scratch, slot);
            scratch
        }
        Allocation::None => panic!("operand reached emission with no allocation"),
    }
}

/// The inverse: if `op` lives on the stack, `scratch` held its new value
/// and must be spilled back out after the real instruction executes.
fn finish_def(buf: &mut MachBuffer, op: &RegOperand, scratch: PReg) {
    if let Allocation::Stack(slot) = op.alloc {
        spill(buf, scratch, slot);
    }
}

fn alu_opcode(op: AluOp) -> (u8, u8) {
    // (register-form opcode "op r/m64, r64", group-1 /digit for immediate form)
    match op {
        AluOp::Add => (0x01, 0),
        AluOp::Or => (0x09, 1),
        AluOp::And => (0x21, 4),
        AluOp::Sub => (0x29, 5),
        AluOp::Xor => (0x31, 6),
        AluOp::Imul => (0x0F, 0xFF), // handled specially, see emit()
    }
}

fn cc_code(cc: IntCC) -> u8 {
    use IntCC::*;
    match cc {
        Equal => 0x4,
        NotEqual => 0x5,
        SignedLessThan => 0xC,
        SignedGreaterThanOrEqual => 0xD,
        SignedGreaterThan => 0xF,
        SignedLessThanOrEqual => 0xE,
        UnsignedLessThan => 0x2,
        UnsignedGreaterThanOrEqual => 0x3,
        UnsignedGreaterThan => 0x7,
        UnsignedLessThanOrEqual => 0x6,
    }
}

pub fn emit(buf: &mut MachBuffer, inst: &Inst) {
    match inst {
        Inst::MovRI { dst, imm } => {
            let d = resolve_dest_reg(dst);
            if let Ok(imm32) = i32::try_from(*imm) {
                buf.put1(rex(true, false, false, d.hw_enc() & 0x8 != 0));
                buf.put1(0xC7);
                buf.put1(modrm(0b11, 0, d.hw_enc()));
                buf.put4_le(imm32 as u32);
            } else {
                buf.put1(rex(true, false, false, d.hw_enc() & 0x8 != 0));
                buf.put1(0xB8 + (d.hw_enc() & 0x7));
                buf.put8_le(*imm as u64);
            }
            finish_def(buf, dst, d);
        }
        Inst::MovRR { dst, src } => {
            let s = resolve_use(buf, src, R10);
            let d = dest_scratch_or_real(dst);
            buf.put1(rex(true, reg_high(s), false, reg_high(d)));
            buf.put1(0x89);
            buf.put1(modrm(0b11, s.hw_enc(), d.hw_enc()));
            finish_def(buf, dst, d);
        }
        Inst::AluRR { op, dst, src } => {
            let s = resolve_use(buf, src, R10);
            let d = resolve_use(buf, dst, R11);
            if *op == AluOp::Imul {
                buf.put1(rex(true, reg_high(d), false, reg_high(s)));
                buf.put1(0x0F);
                buf.put1(0xAF);
                buf.put1(modrm(0b11, d.hw_enc(), s.hw_enc()));
            } else {
                let (opc, _) = alu_opcode(*op);
                buf.put1(rex(true, reg_high(s), false, reg_high(d)));
                buf.put1(opc);
                buf.put1(modrm(0b11, s.hw_enc(), d.hw_enc()));
            }
            finish_def(buf, dst, d);
        }
        Inst::AluRI { op, dst, imm } => {
            let d = resolve_use(buf, dst, R11);
            let (_, digit) = alu_opcode(*op);
            buf.put1(rex(true, false, false, reg_high(d)));
            buf.put1(0x81);
            buf.put1(modrm(0b11, digit, d.hw_enc()));
            buf.put4_le(*imm as u32);
            finish_def(buf, dst, d);
        }
        Inst::Load { dst, base, offset } => {
            let b = resolve_use(buf, base, R10);
            let d = dest_scratch_or_real(dst);
            buf.put1(rex(true, reg_high(d), false, reg_high(b)));
            buf.put1(0x8B);
            buf.put1(modrm(0b10, d.hw_enc(), b.hw_enc()));
            buf.put4_le(*offset as u32);
            finish_def(buf, dst, d);
        }
        Inst::Store { src, base, offset } => {
            let s = resolve_use(buf, src, R11);
            let b = resolve_use(buf, base, R10);
            buf.put1(rex(true, reg_high(s), false, reg_high(b)));
            buf.put1(0x89);
            buf.put1(modrm(0b10, s.hw_enc(), b.hw_enc()));
            buf.put4_le(*offset as u32);
        }
        Inst::CmpRR { a, b } => {
            let rb = resolve_use(buf, b, R10);
            let ra = resolve_use(buf, a, R11);
            buf.put1(rex(true, reg_high(rb), false, reg_high(ra)));
            buf.put1(0x39);
            buf.put1(modrm(0b11, rb.hw_enc(), ra.hw_enc()));
        }
        Inst::CmpRI { a, imm } => {
            let ra = resolve_use(buf, a, R11);
            buf.put1(rex(true, false, false, reg_high(ra)));
            buf.put1(0x81);
            buf.put1(modrm(0b11, 7, ra.hw_enc()));
            buf.put4_le(*imm as u32);
        }
        Inst::SetCC { cc, dst } => {
            let d = dest_scratch_or_real(dst);
            if reg_high(d) {
                buf.put1(rex(false, false, false, true));
            }
            buf.put1(0x0F);
            buf.put1(0x90 | cc_code(*cc));
            buf.put1(modrm(0b11, 0, d.hw_enc()));
            finish_def(buf, dst, d);
        }
        Inst::Jmp { target } => {
            buf.put1(0xE9);
            let origin = buf.cur_offset() + 4;
            buf.use_label_at_offset(*target, 4, origin);
        }
        Inst::JmpIf { cc, target } => {
            buf.put1(0x0F);
            buf.put1(0x80 | cc_code(*cc));
            let origin = buf.cur_offset() + 4;
            buf.use_label_at_offset(*target, 4, origin);
        }
        Inst::Ret => {
            buf.put1(0xC3);
        }
        Inst::Call { target, .. } => {
            buf.put1(0xE8);
            buf.add_reloc(RelocKind::PcRel32, *target, -4);
            buf.put4_le(0);
        }
        Inst::Ud2 => {
            buf.put1(0x0F);
            buf.put1(0x0B);
        }
    }
}

fn reg_high(p: PReg) -> bool {
    p.hw_enc() & 0x8 != 0
}

/// A pure `Def` operand (no prior value to reload) still needs a concrete
/// register to encode against even when spilled; `R11` stands in and gets
/// spilled back out by `finish_def`.
fn resolve_dest_reg(op: &RegOperand) -> PReg {
    match op.alloc {
        Allocation::Reg(p) => p,
        Allocation::Stack(_) => R11,
        Allocation::None => panic!("operand reached emission with no allocation"),
    }
}

fn dest_scratch_or_real(op: &RegOperand) -> PReg {
    resolve_dest_reg(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::x64::inst::RegOperand;
    use crate::machinst::{RegClass, VReg};

    fn reg_op(idx: usize, p: PReg) -> RegOperand {
        RegOperand {
            vreg: VReg::new(idx, RegClass::Int),
            alloc: Allocation::Reg(p),
            fixed: None,
        }
    }

    #[test]
    fn mov_ri_fits_imm32_uses_c7() {
        let mut buf = MachBuffer::new();
        emit(
            &mut buf,
            &Inst::MovRI {
                dst: reg_op(0, super::super::regs::RAX),
                imm: 42,
            },
        );
        let (bytes, _, _) = buf.finish();
        assert_eq!(bytes[1], 0xC7);
    }

    #[test]
    fn mov_ri_large_imm_uses_movabs() {
        let mut buf = MachBuffer::new();
        emit(
            &mut buf,
            &Inst::MovRI {
                dst: reg_op(0, super::super::regs::RAX),
                imm: i64::MAX,
            },
        );
        let (bytes, _, _) = buf.finish();
        assert_eq!(bytes[1], 0xB8);
    }

    #[test]
    fn ret_emits_single_byte() {
        let mut buf = MachBuffer::new();
        emit(&mut buf, &Inst::Ret);
        let (bytes, _, _) = buf.finish();
        assert_eq!(bytes, vec![0xC3]);
    }

    #[test]
    fn spilled_operand_is_reloaded_before_use() {
        let mut buf = MachBuffer::new();
        let dst = RegOperand {
            vreg: VReg::new(0, RegClass::Int),
            alloc: Allocation::Stack(SpillSlot::from_u32(0)),
            fixed: None,
        };
        emit(&mut buf, &Inst::MovRI { dst, imm: 7 });
        let (bytes, _, _) = buf.finish();
        // MovRI writes into the scratch register, then spill() stores it back: the
        // trailing bytes must be the rbp-relative store (opcode 0x89).
        assert!(bytes.windows(1).any(|w| w[0] == 0x89));
    }
}

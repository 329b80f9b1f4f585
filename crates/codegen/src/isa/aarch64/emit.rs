//! Encoding AArch64 `Inst`s into bytes. Every AArch64 instruction is a
//! fixed 4-byte little-endian word, which makes this encoder simpler than
//! x86-64's variable-length one: every case below builds one `u32` and
//! writes it with `put4_le`.
//!
//! Spilled operands are handled the same way as the x64 backend: a spilled
//! `Use` is reloaded into a scratch register first, a spilled `Def` is
//! spilled back out afterward. `x16`/`x17` (`SCRATCH0`/`SCRATCH1`) serve as
//! that pair, withheld from the allocator's pool in `isa::x64::regs`'s
//! AArch64 counterpart (`isa::aarch64::regs`).

use super::inst::{AluOp, Inst, RegOperand};
use super::regs::{FP, SCRATCH0, SCRATCH1};
use crate::ir::IntCC;
use crate::machinst::{Allocation, MachBuffer, PReg, RelocKind, SpillSlot};
use retarget_entity::EntityRef;

/// Spilled slots sit below the frame pointer, one 8-byte slot per index,
/// addressed with `ldur`/`stur`'s signed 9-bit unscaled immediate — which
/// bounds this backend to 32 live spill slots per function (`-256..=255`,
/// 8 bytes apart). A production backend would widen this to the scaled
/// `ldr`/`str` form once an offset exceeds that range; this one doesn't.
fn spill_offset(slot: SpillSlot) -> i32 {
    -8 * (slot.index() as i32 + 1)
}

fn reg_no(p: PReg) -> u32 {
    p.hw_enc() as u32
}

fn movz_movk_sequence(buf: &mut MachBuffer, rd: PReg, imm: i64) {
    let bits = imm as u64;
    let mut first = true;
    for hw in 0..4u32 {
        let chunk = ((bits >> (hw * 16)) & 0xFFFF) as u32;
        if chunk == 0 && !(first && hw == 3) {
            continue;
        }
        if first {
            buf.put4_le(movz(rd, hw, chunk));
            first = false;
        } else {
            buf.put4_le(movk(rd, hw, chunk));
        }
    }
    if first {
        // The immediate is exactly zero: `movz xd, #0`.
        buf.put4_le(movz(rd, 0, 0));
    }
}

fn movz(rd: PReg, hw: u32, imm16: u32) -> u32 {
    (1 << 31) | (0b10 << 29) | (0b100101 << 23) | (hw << 21) | (imm16 << 5) | reg_no(rd)
}

fn movk(rd: PReg, hw: u32, imm16: u32) -> u32 {
    (1 << 31) | (0b11 << 29) | (0b100101 << 23) | (hw << 21) | (imm16 << 5) | reg_no(rd)
}

fn mov_reg(rd: PReg, rm: PReg) -> u32 {
    // `mov xd, xm` is the canonical alias for `orr xd, xzr, xm`.
    orr(rd, PReg::new(31, rd.class()), rm)
}

fn add_reg(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (0 << 30) | (0b01011 << 24) | (rm_field(rm)) | (reg_no(rn) << 5) | reg_no(rd)
}

fn sub_reg(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (1 << 30) | (0b01011 << 24) | (rm_field(rm)) | (reg_no(rn) << 5) | reg_no(rd)
}

fn rm_field(rm: PReg) -> u32 {
    reg_no(rm) << 16
}

fn and_reg(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (0b00 << 29) | (0b01010 << 24) | rm_field(rm) | (reg_no(rn) << 5) | reg_no(rd)
}

fn orr(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (0b01 << 29) | (0b01010 << 24) | rm_field(rm) | (reg_no(rn) << 5) | reg_no(rd)
}

fn eor(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (0b10 << 29) | (0b01010 << 24) | rm_field(rm) | (reg_no(rn) << 5) | reg_no(rd)
}

fn mul(rd: PReg, rn: PReg, rm: PReg) -> u32 {
    (1 << 31) | (0b11011 << 24) | rm_field(rm) | (31 << 10) | (reg_no(rn) << 5) | reg_no(rd)
}

fn alu_reg(op: AluOp, rd: PReg, rn: PReg, rm: PReg) -> u32 {
    match op {
        AluOp::Add => add_reg(rd, rn, rm),
        AluOp::Sub => sub_reg(rd, rn, rm),
        AluOp::And => and_reg(rd, rn, rm),
        AluOp::Orr => orr(rd, rn, rm),
        AluOp::Eor => eor(rd, rn, rm),
        AluOp::Mul => mul(rd, rn, rm),
    }
}

/// `add`/`sub` (immediate); only used for the two ops with a real immediate
/// encoding. Callers are responsible for keeping `imm` within 12 bits
/// (lowering only selects this form when it fits).
fn alu_imm(op: AluOp, rd: PReg, rn: PReg, imm: i32) -> u32 {
    let sub = matches!(op, AluOp::Sub);
    (1 << 31) | ((sub as u32) << 30) | (0b100010 << 23) | ((imm as u32 & 0xFFF) << 10) | (reg_no(rn) << 5) | reg_no(rd)
}

fn subs_reg(rn: PReg, rm: PReg) -> u32 {
    // `cmp xn, xm` == `subs xzr, xn, xm`.
    (1 << 31) | (1 << 30) | (1 << 29) | (0b01011 << 24) | rm_field(rm) | (reg_no(rn) << 5) | 31
}

fn subs_imm(rn: PReg, imm: i32) -> u32 {
    // `cmp xn, #imm` == `subs xzr, xn, #imm`.
    (1 << 31) | (1 << 30) | (1 << 29) | (0b100010 << 23) | ((imm as u32 & 0xFFF) << 10) | (reg_no(rn) << 5) | 31
}

fn cc_code(cc: IntCC) -> u32 {
    use IntCC::*;
    match cc {
        Equal => 0b0000,
        NotEqual => 0b0001,
        UnsignedLessThan => 0b0011,
        UnsignedGreaterThanOrEqual => 0b0010,
        UnsignedGreaterThan => 0b1000,
        UnsignedLessThanOrEqual => 0b1001,
        SignedLessThan => 0b1011,
        SignedGreaterThanOrEqual => 0b1010,
        SignedGreaterThan => 0b1100,
        SignedLessThanOrEqual => 0b1101,
    }
}

fn invert_cc(code: u32) -> u32 {
    code ^ 1
}

fn cset(rd: PReg, cc: IntCC) -> u32 {
    // `cset xd, cc` == `csinc xd, xzr, xzr, invert(cc)`.
    let cond = invert_cc(cc_code(cc));
    (1 << 31) | (0b11010100 << 21) | (31 << 16) | (cond << 12) | (0b01 << 10) | (31 << 5) | reg_no(rd)
}

fn ldur(rt: PReg, rn: PReg, imm9: i32) -> u32 {
    (0b11 << 30) | (0b111000 << 24) | (0b01 << 22) | ((imm9 as u32 & 0x1FF) << 12) | (reg_no(rn) << 5) | reg_no(rt)
}

fn stur(rt: PReg, rn: PReg, imm9: i32) -> u32 {
    (0b11 << 30) | (0b111000 << 24) | (0b00 << 22) | ((imm9 as u32 & 0x1FF) << 12) | (reg_no(rn) << 5) | reg_no(rt)
}

fn ldr_unsigned(rt: PReg, rn: PReg, scaled_imm12: u32) -> u32 {
    (0b11 << 30) | (0b111 << 27) | (0b01 << 24) | (0b01 << 22) | ((scaled_imm12 & 0xFFF) << 10) | (reg_no(rn) << 5) | reg_no(rt)
}

fn str_unsigned(rt: PReg, rn: PReg, scaled_imm12: u32) -> u32 {
    (0b11 << 30) | (0b111 << 27) | (0b01 << 24) | (0b00 << 22) | ((scaled_imm12 & 0xFFF) << 10) | (reg_no(rn) << 5) | reg_no(rt)
}

fn b(imm26: i32) -> u32 {
    (0b000101 << 26) | (imm26 as u32 & 0x3FF_FFFF)
}

fn b_cond(imm19: i32, cond: u32) -> u32 {
    (0b01010100 << 24) | ((imm19 as u32 & 0x7_FFFF) << 5) | cond
}

fn bl(imm26: i32) -> u32 {
    (0b100101 << 26) | (imm26 as u32 & 0x3FF_FFFF)
}

const RET: u32 = 0xD65F_03C0;
const BRK: u32 = 0xD420_0000;

fn resolve_use(buf: &mut MachBuffer, op: &RegOperand, scratch: PReg) -> PReg {
    match op.alloc {
        Allocation::Reg(p) => p,
        Allocation::Stack(slot) => {
            buf.put4_le(ldur(scratch, FP, spill_offset(slot)));
            scratch
        }
        Allocation::None => panic!("operand reached emission with no allocation"),
    }
}

fn resolve_dest(op: &RegOperand, scratch: PReg) -> PReg {
    match op.alloc {
        Allocation::Reg(p) => p,
        Allocation::Stack(_) => scratch,
        Allocation::None => panic!("operand reached emission with no allocation"),
    }
}

fn finish_def(buf: &mut MachBuffer, op: &RegOperand, scratch: PReg) {
    if let Allocation::Stack(slot) = op.alloc {
        buf.put4_le(stur(scratch, FP, spill_offset(slot)));
    }
}

pub fn emit(buf: &mut MachBuffer, inst: &Inst) {
    match inst {
        Inst::MovI { dst, imm } => {
            let d = resolve_dest(dst, SCRATCH0);
            movz_movk_sequence(buf, d, *imm);
            finish_def(buf, dst, d);
        }
        Inst::MovR { dst, src } => {
            let s = resolve_use(buf, src, SCRATCH0);
            let d = resolve_dest(dst, SCRATCH1);
            buf.put4_le(mov_reg(d, s));
            finish_def(buf, dst, d);
        }
        Inst::AluRRR { op, dst, a, b } => {
            let ra = resolve_use(buf, a, SCRATCH0);
            let rb = resolve_use(buf, b, SCRATCH1);
            let rd = resolve_dest(dst, SCRATCH0);
            buf.put4_le(alu_reg(*op, rd, ra, rb));
            finish_def(buf, dst, rd);
        }
        Inst::AluRRI { op, dst, a, imm } => {
            let ra = resolve_use(buf, a, SCRATCH0);
            let rd = resolve_dest(dst, SCRATCH1);
            buf.put4_le(alu_imm(*op, rd, ra, *imm));
            finish_def(buf, dst, rd);
        }
        Inst::Load { dst, base, offset } => {
            let rb = resolve_use(buf, base, SCRATCH0);
            let rd = resolve_dest(dst, SCRATCH1);
            let scaled = (*offset / 8) as u32;
            buf.put4_le(ldr_unsigned(rd, rb, scaled));
            finish_def(buf, dst, rd);
        }
        Inst::Store { src, base, offset } => {
            let rs = resolve_use(buf, src, SCRATCH1);
            let rb = resolve_use(buf, base, SCRATCH0);
            let scaled = (*offset / 8) as u32;
            buf.put4_le(str_unsigned(rs, rb, scaled));
        }
        Inst::CmpRR { a, b } => {
            let ra = resolve_use(buf, a, SCRATCH0);
            let rb = resolve_use(buf, b, SCRATCH1);
            buf.put4_le(subs_reg(ra, rb));
        }
        Inst::CmpRI { a, imm } => {
            let ra = resolve_use(buf, a, SCRATCH0);
            buf.put4_le(subs_imm(ra, *imm));
        }
        Inst::CSet { cc, dst } => {
            let rd = resolve_dest(dst, SCRATCH0);
            buf.put4_le(cset(rd, *cc));
            finish_def(buf, dst, rd);
        }
        Inst::B { target } => {
            let word_at = buf.cur_offset();
            buf.put4_le(b(0));
            buf.use_label_in_word(*target, word_at, 26, 0);
        }
        Inst::BCond { cc, target } => {
            let word_at = buf.cur_offset();
            buf.put4_le(b_cond(0, cc_code(*cc)));
            buf.use_label_in_word(*target, word_at, 19, 5);
        }
        Inst::Ret => {
            buf.put4_le(RET);
        }
        Inst::Bl { target, .. } => {
            buf.add_reloc(RelocKind::PcRel32, *target, 0);
            buf.put4_le(bl(0));
        }
        Inst::Brk => {
            buf.put4_le(BRK);
        }
    }
}

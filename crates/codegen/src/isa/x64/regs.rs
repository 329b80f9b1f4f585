//! The System V x86-64 general-purpose and SSE register files, named the
//! way the ISA reference manuals do.

use crate::machinst::{PReg, RegClass};

pub const RAX: PReg = PReg::new(0, RegClass::Int);
pub const RCX: PReg = PReg::new(1, RegClass::Int);
pub const RDX: PReg = PReg::new(2, RegClass::Int);
pub const RBX: PReg = PReg::new(3, RegClass::Int);
pub const RSP: PReg = PReg::new(4, RegClass::Int);
pub const RBP: PReg = PReg::new(5, RegClass::Int);
pub const RSI: PReg = PReg::new(6, RegClass::Int);
pub const RDI: PReg = PReg::new(7, RegClass::Int);
pub const R8: PReg = PReg::new(8, RegClass::Int);
pub const R9: PReg = PReg::new(9, RegClass::Int);
pub const R10: PReg = PReg::new(10, RegClass::Int);
pub const R11: PReg = PReg::new(11, RegClass::Int);
pub const R12: PReg = PReg::new(12, RegClass::Int);
pub const R13: PReg = PReg::new(13, RegClass::Int);
pub const R14: PReg = PReg::new(14, RegClass::Int);
pub const R15: PReg = PReg::new(15, RegClass::Int);

pub const XMM0: PReg = PReg::new(0, RegClass::Float);

/// General-purpose registers available to the allocator, in the order it
/// should prefer them: caller-saved scratch registers first (cheapest to
/// use without needing a prologue save), then callee-saved ones. `rsp` and
/// `rbp` are withheld entirely (frame pointer and stack pointer are fixed),
/// and so are `r10`/`r11` — the emitter reserves that pair as scratch for
/// reloading spilled operands (see `isa::x64::emit`), so the allocator must
/// never hand them to a vreg.
pub fn allocatable_int() -> Vec<PReg> {
    vec![RAX, RCX, RDX, RSI, RDI, R8, R9, RBX, R12, R13, R14, R15]
}

/// System V integer argument registers, in order.
pub const ARG_REGS: [PReg; 6] = [RDI, RSI, RDX, RCX, R8, R9];

pub const RETURN_REG: PReg = RAX;

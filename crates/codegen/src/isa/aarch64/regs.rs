//! The AArch64 general-purpose and SIMD/FP register files. Hardware encoding
//! numbers match the architecture reference manual's `Xn`/`Dn` numbering;
//! `x29`/`x30` (frame pointer, link register) and `sp` are withheld from the
//! allocator's pool, same as `rbp`/`rsp` are on x86-64.

use crate::machinst::{PReg, RegClass};

pub const X0: PReg = PReg::new(0, RegClass::Int);
pub const X1: PReg = PReg::new(1, RegClass::Int);
pub const X2: PReg = PReg::new(2, RegClass::Int);
pub const X3: PReg = PReg::new(3, RegClass::Int);
pub const X4: PReg = PReg::new(4, RegClass::Int);
pub const X5: PReg = PReg::new(5, RegClass::Int);
pub const X6: PReg = PReg::new(6, RegClass::Int);
pub const X7: PReg = PReg::new(7, RegClass::Int);
pub const X8: PReg = PReg::new(8, RegClass::Int);
pub const X9: PReg = PReg::new(9, RegClass::Int);
pub const X10: PReg = PReg::new(10, RegClass::Int);
pub const X11: PReg = PReg::new(11, RegClass::Int);
pub const X12: PReg = PReg::new(12, RegClass::Int);
pub const X13: PReg = PReg::new(13, RegClass::Int);
pub const X14: PReg = PReg::new(14, RegClass::Int);
pub const X15: PReg = PReg::new(15, RegClass::Int);
pub const X16: PReg = PReg::new(16, RegClass::Int);
pub const X17: PReg = PReg::new(17, RegClass::Int);
pub const X18: PReg = PReg::new(18, RegClass::Int);
pub const X19: PReg = PReg::new(19, RegClass::Int);
pub const X20: PReg = PReg::new(20, RegClass::Int);
pub const X21: PReg = PReg::new(21, RegClass::Int);
pub const X22: PReg = PReg::new(22, RegClass::Int);
pub const X23: PReg = PReg::new(23, RegClass::Int);
pub const X24: PReg = PReg::new(24, RegClass::Int);
pub const X25: PReg = PReg::new(25, RegClass::Int);
pub const X26: PReg = PReg::new(26, RegClass::Int);
pub const X27: PReg = PReg::new(27, RegClass::Int);
pub const X28: PReg = PReg::new(28, RegClass::Int);
pub const FP: PReg = PReg::new(29, RegClass::Int);
pub const LR: PReg = PReg::new(30, RegClass::Int);
pub const SP: PReg = PReg::new(31, RegClass::Int);

pub const D0: PReg = PReg::new(0, RegClass::Float);

/// Scratch pair the emitter reserves for reloading spilled operands: `x16`
/// and `x17` are the architecture's own designated "intra-procedure-call"
/// scratch registers (`ip0`/`ip1`), so no ABI-visible value ever lives in
/// them across a call, which makes them a natural choice to withhold here
/// as well.
pub const SCRATCH0: PReg = X16;
pub const SCRATCH1: PReg = X17;

/// General-purpose registers available to the allocator: caller-saved
/// first, `x16`/`x17`/`x18`/`x29`/`x30`/`sp` withheld (`x18` is the
/// platform register on several AArch64 ABIs and this backend doesn't
/// allocate it to stay portable).
pub fn allocatable_int() -> Vec<PReg> {
    vec![
        X0, X1, X2, X3, X4, X5, X6, X7, X8, X9, X10, X11, X12, X13, X14, X15, X19, X20, X21, X22,
        X23, X24, X25, X26, X27, X28,
    ]
}

/// AAPCS64 integer argument registers, in order.
pub const ARG_REGS: [PReg; 8] = [X0, X1, X2, X3, X4, X5, X6, X7];

pub const RETURN_REG: PReg = X0;

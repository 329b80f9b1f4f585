//! Virtual and physical registers, and the register classes they belong to.

use core::fmt;
use retarget_entity::entity_impl;

/// Which register file a value lives in. `Float` and `Vector` are the same
/// physical file on AArch64 (every `V` register is addressable as a scalar
/// float or a vector) but distinct files on x86-64 (general registers vs.
/// `xmm`/`ymm`), so they stay separate classes here and it's each target's
/// job to alias them if its ISA doesn't distinguish them.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RegClass {
    Int,
    Float,
    Vector,
}

impl RegClass {
    pub fn index(self) -> usize {
        match self {
            RegClass::Int => 0,
            RegClass::Float => 1,
            RegClass::Vector => 2,
        }
    }

    pub const COUNT: usize = 3;
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RegClass::Int => "int",
            RegClass::Float => "float",
            RegClass::Vector => "vector",
        };
        f.write_str(s)
    }
}

/// A virtual register: infinite supply, allocated densely per function
/// during lowering. Two `VReg`s are never compared across functions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(u32);
entity_impl!(VReg, "v");

impl VReg {
    /// `VReg`s pack their register class into the low two bits, since
    /// lowering creates a lot of them and a per-vreg side table would be an
    /// extra indirection on every liveness/allocation query.
    pub fn new(index: usize, class: RegClass) -> Self {
        debug_assert!(index < (1 << 29));
        VReg(((index as u32) << 2) | class.index() as u32)
    }

    pub fn class(self) -> RegClass {
        match self.0 & 0b11 {
            0 => RegClass::Int,
            1 => RegClass::Float,
            2 => RegClass::Vector,
            _ => unreachable!("only 3 register classes are packed into 2 bits"),
        }
    }

    pub fn raw_index(self) -> usize {
        (self.0 >> 2) as usize
    }
}

impl fmt::Debug for VReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}{}", self.class(), self.raw_index())
    }
}

/// A hardware register: a class plus the target's own encoding number for
/// it (e.g. the 4-bit/5-bit field an x86-64/AArch64 instruction actually
/// stores).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg {
    hw_enc: u8,
    class: RegClass,
}

impl PReg {
    pub const fn new(hw_enc: u8, class: RegClass) -> Self {
        Self { hw_enc, class }
    }

    pub fn hw_enc(self) -> u8 {
        self.hw_enc
    }

    pub fn class(self) -> RegClass {
        self.class
    }
}

impl fmt::Debug for PReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "p{}{}", self.class, self.hw_enc)
    }
}

/// A stack slot reserved by the allocator for a spilled `VReg`, distinct
/// from the IR-level [`StackSlot`](crate::ir::StackSlot) a function
/// declares for itself: this one is private to the allocator and doesn't
/// exist until allocation runs.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpillSlot(u32);
entity_impl!(SpillSlot, "ss$");

/// Where a [`VReg`] ended up after allocation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Allocation {
    Reg(PReg),
    Stack(SpillSlot),
    /// The vreg is a pure constant materialized in-place at every use; it
    /// never occupies a register or a spill slot.
    None,
}

impl Allocation {
    pub fn as_reg(self) -> Option<PReg> {
        match self {
            Allocation::Reg(r) => Some(r),
            _ => None,
        }
    }
}

/// How an [`Operand`] constrains the allocator's choice of [`Allocation`]
/// for its `VReg`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OperandConstraint {
    /// Any register in the operand's class.
    AnyReg,
    /// Exactly this physical register (an ABI argument slot, a hardware
    /// division quotient register, ...).
    FixedReg(PReg),
    /// Must be allocated the same location as operand index `.0` (a tied,
    /// reuse-the-source-as-destination operand).
    Reuse(usize),
    /// May live on the stack rather than in a register (so spilling it
    /// costs nothing extra).
    Stack,
}

/// Whether an operand is read, written, or both by the instruction it
/// belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OperandPos {
    Use,
    Def,
    UseDef,
}

/// One operand slot of a machine instruction: which `VReg` it names, how
/// the allocator may place it, and whether it's read, written, or both.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Operand {
    pub vreg: VReg,
    pub constraint: OperandConstraint,
    pub pos: OperandPos,
}

impl Operand {
    pub fn new(vreg: VReg, constraint: OperandConstraint, pos: OperandPos) -> Self {
        Self {
            vreg,
            constraint,
            pos,
        }
    }

    pub fn reg_use(vreg: VReg) -> Self {
        Self::new(vreg, OperandConstraint::AnyReg, OperandPos::Use)
    }

    pub fn reg_def(vreg: VReg) -> Self {
        Self::new(vreg, OperandConstraint::AnyReg, OperandPos::Def)
    }

    pub fn fixed_use(vreg: VReg, preg: PReg) -> Self {
        Self::new(vreg, OperandConstraint::FixedReg(preg), OperandPos::Use)
    }

    pub fn fixed_def(vreg: VReg, preg: PReg) -> Self {
        Self::new(vreg, OperandConstraint::FixedReg(preg), OperandPos::Def)
    }

    pub fn is_use(self) -> bool {
        matches!(self.pos, OperandPos::Use | OperandPos::UseDef)
    }

    pub fn is_def(self) -> bool {
        matches!(self.pos, OperandPos::Def | OperandPos::UseDef)
    }
}

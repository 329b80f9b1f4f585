//! Condition codes: how `icmp`/`fcmp` compare their operands.

use core::fmt;

/// Common operations on a condition code.
pub trait CondCode: Copy {
    /// The condition code that is true exactly when `self` is false.
    #[must_use]
    fn inverse(self) -> Self;

    /// The condition code equivalent to swapping the comparison's operands.
    #[must_use]
    fn reverse(self) -> Self;
}

/// Condition code for `icmp`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum IntCC {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedGreaterThanOrEqual,
    SignedGreaterThan,
    SignedLessThanOrEqual,
    UnsignedLessThan,
    UnsignedGreaterThanOrEqual,
    UnsignedGreaterThan,
    UnsignedLessThanOrEqual,
}

impl CondCode for IntCC {
    fn inverse(self) -> Self {
        use IntCC::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            SignedLessThan => SignedGreaterThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThan,
            SignedGreaterThan => SignedLessThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThan,
            UnsignedLessThan => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThan,
            UnsignedGreaterThan => UnsignedLessThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThan,
        }
    }

    fn reverse(self) -> Self {
        use IntCC::*;
        match self {
            Equal => Equal,
            NotEqual => NotEqual,
            SignedLessThan => SignedGreaterThan,
            SignedGreaterThan => SignedLessThan,
            SignedLessThanOrEqual => SignedGreaterThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThanOrEqual,
            UnsignedLessThan => UnsignedGreaterThan,
            UnsignedGreaterThan => UnsignedLessThan,
            UnsignedLessThanOrEqual => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThanOrEqual,
        }
    }
}

impl fmt::Display for IntCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use IntCC::*;
        let s = match self {
            Equal => "eq",
            NotEqual => "ne",
            SignedLessThan => "slt",
            SignedGreaterThanOrEqual => "sge",
            SignedGreaterThan => "sgt",
            SignedLessThanOrEqual => "sle",
            UnsignedLessThan => "ult",
            UnsignedGreaterThanOrEqual => "uge",
            UnsignedGreaterThan => "ugt",
            UnsignedLessThanOrEqual => "ule",
        };
        f.write_str(s)
    }
}

/// Condition code for `fcmp`. Deliberately has no `Overflow` variants (those
/// are integer-only) and treats unordered comparisons explicitly, since IEEE
/// float comparisons with NaN are neither "less" nor "greater".
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FloatCC {
    Ordered,
    Unordered,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CondCode for FloatCC {
    fn inverse(self) -> Self {
        use FloatCC::*;
        match self {
            Ordered => Unordered,
            Unordered => Ordered,
            Equal => NotEqual,
            NotEqual => Equal,
            LessThan => GreaterThanOrEqual,
            LessThanOrEqual => GreaterThan,
            GreaterThan => LessThanOrEqual,
            GreaterThanOrEqual => LessThan,
        }
    }

    fn reverse(self) -> Self {
        use FloatCC::*;
        match self {
            LessThan => GreaterThan,
            GreaterThan => LessThan,
            LessThanOrEqual => GreaterThanOrEqual,
            GreaterThanOrEqual => LessThanOrEqual,
            other => other,
        }
    }
}

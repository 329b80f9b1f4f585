//! A compact `Option<T>` for entity references.
//!
//! `Option<EntityRef>` is twice the size of the reference itself because of
//! the discriminant. Compact data structures (instruction operand lists,
//! `Value` definitions) instead use [`PackedOption`], which reserves one
//! value (`u32::MAX`, via [`ReservedValue`]) to mean "none".

use core::fmt;

/// A value that has one bit pattern reserved to represent "no value",
/// allowing it to be packed into an `Option`-like wrapper at no extra cost.
pub trait ReservedValue {
    /// The reserved "none" value.
    fn reserved_value() -> Self;

    /// Is `self` the reserved "none" value?
    fn is_reserved_value(&self) -> bool;
}

/// An `Option<T>`-alike with no size overhead, for `T: ReservedValue`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct PackedOption<T: ReservedValue>(T);

impl<T: ReservedValue> PackedOption<T> {
    /// Is this `None`?
    pub fn is_none(&self) -> bool {
        self.0.is_reserved_value()
    }

    /// Is this `Some`?
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Convert to a plain `Option<T>`.
    pub fn expand(self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Map the contained value, if any.
    pub fn map<U: ReservedValue>(self, f: impl FnOnce(T) -> U) -> PackedOption<U> {
        self.expand().map(f).into()
    }

    /// Unwrap, panicking if `None`.
    pub fn unwrap(self) -> T {
        self.expand().expect("PackedOption::unwrap on a None value")
    }
}

impl<T: ReservedValue> Default for PackedOption<T> {
    fn default() -> Self {
        Self(T::reserved_value())
    }
}

impl<T: ReservedValue> From<T> for PackedOption<T> {
    fn from(t: T) -> Self {
        debug_assert!(!t.is_reserved_value(), "cannot pack a reserved value");
        Self(t)
    }
}

impl<T: ReservedValue> From<Option<T>> for PackedOption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(t) => t.into(),
            None => Self::default(),
        }
    }
}

impl<T: ReservedValue + fmt::Debug> fmt::Debug for PackedOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expand() {
            Some(t) => t.fmt(f),
            None => write!(f, "None"),
        }
    }
}

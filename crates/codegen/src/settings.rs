//! Compile-time configuration: optimization level, verifier/peephole
//! toggles, and the calling-convention default, built through a small
//! `Builder` so the driver's `Context` (in the `retarget-module` crate)
//! and the target-specific ISA layer can share one source of truth.

use crate::ir::CallConv;
use core::fmt;

/// How aggressively to optimize, independent of which passes actually run
/// (`verify`/`optimize` in [`Flags`] gate the passes this crate has;
/// `opt_level` is forwarded to consumers that also run their own passes
/// upstream of this library, e.g. inlining in a caller's IR builder).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum OptLevel {
    /// No optimization; fastest compile.
    None,
    /// The peephole pass only.
    #[default]
    Basic,
    /// Reserved for a future, costlier pass; currently identical to
    /// `Basic` since this crate implements only one optimization pass.
    Moderate,
    /// Reserved for a future, costlier pass; currently identical to
    /// `Basic`.
    Aggressive,
}

impl OptLevel {
    /// Should the peephole pass run at this level?
    pub fn runs_peephole(self) -> bool {
        self != OptLevel::None
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            OptLevel::None => "none",
            OptLevel::Basic => "basic",
            OptLevel::Moderate => "moderate",
            OptLevel::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

/// Configuration shared by every compile in one [`Context`](crate::Context):
/// optimization level, whether to run the verifier and peephole pass, and
/// the calling-convention default for functions that don't specify their
/// own.
#[derive(Copy, Clone, Debug)]
pub struct Flags {
    opt_level: OptLevel,
    verify: bool,
    optimize: bool,
    default_call_conv: CallConv,
}

impl Flags {
    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    pub fn verify(&self) -> bool {
        self.verify
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }

    pub fn default_call_conv(&self) -> CallConv {
        self.default_call_conv
    }
}

impl Default for Flags {
    fn default() -> Self {
        Builder::new().finish()
    }
}

/// Builds a [`Flags`] one knob at a time, mirroring the target-independent
/// half of the driver's configuration surface (target selection itself
/// lives on `Context`, since it picks which ISA backend gets instantiated).
#[derive(Copy, Clone, Debug)]
pub struct Builder {
    opt_level: OptLevel,
    verify: bool,
    optimize: bool,
    default_call_conv: CallConv,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            opt_level: OptLevel::Basic,
            verify: true,
            optimize: true,
            default_call_conv: CallConv::SystemV,
        }
    }

    #[must_use]
    pub fn opt_level(mut self, level: OptLevel) -> Self {
        self.optimize = level.runs_peephole();
        self.opt_level = level;
        self
    }

    #[must_use]
    pub fn verify(mut self, enable: bool) -> Self {
        self.verify = enable;
        self
    }

    #[must_use]
    pub fn optimize(mut self, enable: bool) -> Self {
        self.optimize = enable;
        self
    }

    #[must_use]
    pub fn call_conv(mut self, cc: CallConv) -> Self {
        self.default_call_conv = cc;
        self
    }

    pub fn finish(self) -> Flags {
        Flags {
            opt_level: self.opt_level,
            verify: self.verify,
            optimize: self.optimize,
            default_call_conv: self.default_call_conv,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_level_none_disables_peephole() {
        let flags = Builder::new().opt_level(OptLevel::None).finish();
        assert!(!flags.optimize());
    }

    #[test]
    fn defaults_verify_and_optimize() {
        let flags = Flags::default();
        assert!(flags.verify());
        assert!(flags.optimize());
        assert_eq!(flags.opt_level(), OptLevel::Basic);
    }
}

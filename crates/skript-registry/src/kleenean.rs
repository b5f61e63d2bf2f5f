//! Three-valued logic.
//!
//! Used wherever the loader needs to know whether something is
//! deterministically known yet, e.g. "is this statement preceded by a delay?".

use std::fmt;
use std::ops::Not;

/// A boolean that may also be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kleenean {
    False,
    Unknown,
    True,
}

impl Kleenean {
    /// Lift a plain boolean.
    #[must_use]
    pub const fn from_bool(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }

    /// Positive is true, negative is false, zero is unknown.
    #[must_use]
    pub const fn from_sign(i: i64) -> Self {
        if i > 0 {
            Self::True
        } else if i < 0 {
            Self::False
        } else {
            Self::Unknown
        }
    }

    /// Same as [`Kleenean::from_sign`] for floating point values. NaN is unknown.
    #[must_use]
    pub fn from_sign_f64(d: f64) -> Self {
        if d > 0.0 {
            Self::True
        } else if d < 0.0 {
            Self::False
        } else {
            Self::Unknown
        }
    }

    /// Equality that is unknown as soon as either side is.
    #[must_use]
    pub fn is(self, other: Self) -> Self {
        if self == Self::Unknown || other == Self::Unknown {
            Self::Unknown
        } else {
            Self::from_bool(self == other)
        }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn implies(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::True) => Self::True,
            (Self::True, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl Not for Kleenean {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl From<bool> for Kleenean {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

impl fmt::Display for Kleenean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::False => "false",
            Self::Unknown => "unknown",
            Self::True => "true",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Kleenean::{False, True, Unknown};
    use super::*;

    #[test]
    fn test_and_or() {
        assert_eq!(True.and(True), True);
        assert_eq!(True.and(Unknown), Unknown);
        assert_eq!(Unknown.and(False), False);
        assert_eq!(False.or(Unknown), Unknown);
        assert_eq!(Unknown.or(True), True);
        assert_eq!(False.or(False), False);
    }

    #[test]
    fn test_not_and_implies() {
        assert_eq!(!True, False);
        assert_eq!(!Unknown, Unknown);
        assert_eq!(False.implies(False), True);
        assert_eq!(True.implies(False), False);
        assert_eq!(Unknown.implies(False), Unknown);
    }

    #[test]
    fn test_is() {
        assert_eq!(True.is(True), True);
        assert_eq!(True.is(False), False);
        assert_eq!(Unknown.is(Unknown), Unknown);
    }

    #[test]
    fn test_from_sign() {
        assert_eq!(Kleenean::from_sign(3), True);
        assert_eq!(Kleenean::from_sign(-1), False);
        assert_eq!(Kleenean::from_sign(0), Unknown);
        assert_eq!(Kleenean::from_sign_f64(f64::NAN), Unknown);
        assert_eq!(Unknown.to_string(), "unknown");
    }
}

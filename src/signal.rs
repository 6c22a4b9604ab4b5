use std::fmt::{Debug, Display, Formatter};
use std::ops::Not;

/// A network literal: a gate index with a polarity bit, packed as
/// `index * 2 + complement`.
///
/// Index 0 is the constant node, so `Signal::zero()` is constant false and
/// `Signal::one()` its complement.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Signal(u32);

// Constructors
impl Signal {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn one() -> Self {
        Self(1)
    }

    pub const fn from_index(index: usize) -> Self {
        Self((index as u32) << 1)
    }

    pub const fn new(index: usize, negated: bool) -> Self {
        Self(((index as u32) << 1) | negated as u32)
    }
}

// Getters
impl Signal {
    /// The referenced gate index (0 for the constant node).
    pub const fn index(&self) -> usize {
        (self.0 >> 1) as usize
    }

    pub const fn is_const(&self) -> bool {
        self.index() == 0
    }

    pub const fn is_negated(&self) -> bool {
        self.0 & 1 != 0
    }

    /// Same literal with the polarity conditionally flipped.
    pub const fn negate_if(self, c: bool) -> Self {
        Self(self.0 ^ c as u32)
    }
}

impl From<bool> for Signal {
    fn from(b: bool) -> Self {
        if b {
            Self::one()
        } else {
            Self::zero()
        }
    }
}

impl Not for Signal {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Not for &Signal {
    type Output = Signal;

    fn not(self) -> Self::Output {
        Signal(self.0 ^ 1)
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_const() {
            write!(f, "{}", self.0 & 1)
        } else {
            if self.is_negated() {
                write!(f, "!")?;
            }
            write!(f, "n{}", self.index())
        }
    }
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const() {
        let zero = Signal::zero();
        let one = Signal::one();

        assert!(zero.is_const());
        assert!(one.is_const());

        assert_eq!(zero, !one);
        assert_eq!(one, !zero);

        assert!(!zero.is_negated());
        assert!(one.is_negated());
    }

    #[test]
    fn test_packing() {
        let s = Signal::new(7, true);
        assert_eq!(s.index(), 7);
        assert!(s.is_negated());
        assert_eq!(!s, Signal::from_index(7));
        assert_eq!(s.negate_if(true), Signal::from_index(7));
        assert_eq!(s.negate_if(false), s);
    }
}

use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A literal denoting a function in the [`Store`][crate::store::Store]:
/// a node index with the complement carried in the sign.
///
/// `Ref::none()` (internally 0) is the "no function" sentinel used for
/// unoccupied gate slots; it is never returned by store operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref(i32);

impl Ref {
    pub(crate) const fn new(index: i32) -> Self {
        Self(index)
    }

    /// The "no function" sentinel.
    pub const fn none() -> Self {
        Self(0)
    }

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the index of the referenced node.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "-");
        }
        write!(
            f,
            "{}@{}",
            if self.is_negated() { "~" } else { "" },
            self.index()
        )
    }
}

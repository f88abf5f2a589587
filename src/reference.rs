use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A lightweight handle to a node in the BDD storage.
///
/// The sign encodes a complement edge: a negative value references the
/// negation of the node stored at `index()`. The handle is only meaningful
/// together with the [`Bdd`][crate::bdd::Bdd] manager that produced it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref(i32);

impl Ref {
    pub(crate) const fn new(index: i32) -> Self {
        Self(index)
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Index of the referenced node in the storage.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Polarity-folded representation: `2*index + negated`.
    pub(crate) const fn unsigned(self) -> u32 {
        (self.0.unsigned_abs() << 1) | (self.0 < 0) as u32
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
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}

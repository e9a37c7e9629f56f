//! Either type produced by selective conditions.

use serde::{Deserialize, Serialize};

/// Result of a selective condition: `Left` continues into a branch,
/// `Right` is already final for `select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "side", content = "value", rename_all = "lowercase")]
pub enum Either<L, R> {
    /// Needs further processing.
    Left(L),
    /// Already resolved.
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Returns true for `Left`.
    #[must_use]
    pub const fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    /// Returns true for `Right`.
    #[must_use]
    pub const fn is_right(&self) -> bool {
        matches!(self, Self::Right(_))
    }

    /// Returns the left value.
    #[must_use]
    pub fn left(self) -> Option<L> {
        match self {
            Self::Left(l) => Some(l),
            Self::Right(_) => None,
        }
    }

    /// Returns the right value.
    #[must_use]
    pub fn right(self) -> Option<R> {
        match self {
            Self::Left(_) => None,
            Self::Right(r) => Some(r),
        }
    }
}

//! Construction outcome type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Best-effort output recovered before a failure.
///
/// Partials are type-erased: a failing `seq` may report the intermediate
/// value produced by its first step, which has a different type than the
/// composition's output. Callers recover the value with [`Partial::downcast_ref`].
#[derive(Clone)]
pub struct Partial {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Partial {
    /// Wraps a value as a partial result.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns a reference to the value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns true if the value has type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns the Rust type name of the wrapped value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if both partials share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Partial").field(&self.type_name).finish()
    }
}

/// The result of executing a construction.
///
/// Exactly one variant is populated, and a partial result can only ever be
/// attached to a failure.
#[derive(Debug, Clone)]
pub enum ConstructionOutcome<O, E> {
    /// The construction succeeded.
    Success {
        /// The produced value.
        value: O,
    },
    /// The construction failed.
    Failure {
        /// The failure.
        error: E,
        /// Best-effort output recovered before the failure.
        partial: Option<Partial>,
        /// Id of the sub-construction where the failure originated.
        error_at: Option<String>,
    },
}

impl<O, E> ConstructionOutcome<O, E> {
    /// Creates a success outcome.
    #[must_use]
    pub const fn success(value: O) -> Self {
        Self::Success { value }
    }

    /// Creates a failure outcome with no partial and no origin.
    #[must_use]
    pub const fn failure(error: E) -> Self {
        Self::Failure {
            error,
            partial: None,
            error_at: None,
        }
    }

    /// Creates a failure outcome attributed to `error_at`.
    #[must_use]
    pub fn failure_at(error: E, error_at: impl Into<String>) -> Self {
        Self::Failure {
            error,
            partial: None,
            error_at: Some(error_at.into()),
        }
    }

    /// Attaches a partial result. Success outcomes are returned unchanged.
    #[must_use]
    pub fn with_partial(self, partial: Partial) -> Self {
        match self {
            Self::Failure {
                error, error_at, ..
            } => Self::Failure {
                error,
                partial: Some(partial),
                error_at,
            },
            success @ Self::Success { .. } => success,
        }
    }

    /// Returns true for success outcomes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true for failure outcomes.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Returns the success value.
    #[must_use]
    pub const fn value(&self) -> Option<&O> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Consumes the outcome and returns the success value.
    #[must_use]
    pub fn into_value(self) -> Option<O> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the failure.
    #[must_use]
    pub const fn error(&self) -> Option<&E> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }

    /// Returns the partial result of a failure.
    #[must_use]
    pub const fn partial(&self) -> Option<&Partial> {
        match self {
            Self::Failure { partial, .. } => partial.as_ref(),
            Self::Success { .. } => None,
        }
    }

    /// Returns the id of the sub-construction where a failure originated.
    #[must_use]
    pub fn error_at(&self) -> Option<&str> {
        match self {
            Self::Failure { error_at, .. } => error_at.as_deref(),
            Self::Success { .. } => None,
        }
    }

    /// Maps the success value, leaving failures untouched.
    pub fn map<P>(self, f: impl FnOnce(O) -> P) -> ConstructionOutcome<P, E> {
        match self {
            Self::Success { value } => ConstructionOutcome::Success { value: f(value) },
            Self::Failure {
                error,
                partial,
                error_at,
            } => ConstructionOutcome::Failure {
                error,
                partial,
                error_at,
            },
        }
    }

    /// Maps the failure, leaving success values, partials and origins untouched.
    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> ConstructionOutcome<O, F> {
        match self {
            Self::Success { value } => ConstructionOutcome::Success { value },
            Self::Failure {
                error,
                partial,
                error_at,
            } => ConstructionOutcome::Failure {
                error: f(error),
                partial,
                error_at,
            },
        }
    }

    /// Converts into a standard `Result`, dropping partial and origin.
    pub fn into_result(self) -> Result<O, E> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

impl<O, E> From<Result<O, E>> for ConstructionOutcome<O, E> {
    fn from(result: Result<O, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(error),
        }
    }
}

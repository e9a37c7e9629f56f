//! Error types for the construction engine.
//!
//! Every failure surfaced by a construction is one of the closed
//! [`ConstructionError`] variants, which lets [`ErrorKind`] classification
//! be checked exhaustively by the compiler.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A cloneable, thread-safe underlying cause.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classification kinds for construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The construction ran out of time.
    Timeout,
    /// The construction observed a cancellation signal.
    Cancelled,
    /// The construction rejected its input.
    InputError,
    /// A required capability was not available.
    CapabilityMissing,
    /// A model provider call failed.
    LlmError,
    /// A generic construction failure.
    ConstructionError,
    /// A fixpoint revisited a previous state in strict mode.
    CycleDetected,
    /// A failure that is not a construction error at all.
    Unknown,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InputError => "input_error",
            Self::CapabilityMissing => "capability_missing",
            Self::LlmError => "llm_error",
            Self::ConstructionError => "construction_error",
            Self::CycleDetected => "cycle_detected",
            Self::Unknown => "unknown",
        }
    }

    /// All kinds, in classification order.
    pub const ALL: [Self; 8] = [
        Self::Timeout,
        Self::Cancelled,
        Self::InputError,
        Self::CapabilityMissing,
        Self::LlmError,
        Self::ConstructionError,
        Self::CycleDetected,
        Self::Unknown,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors whose retriability can be queried by `with_retry`.
pub trait Retriable {
    /// Returns true if re-running the failed construction may succeed.
    fn is_retriable(&self) -> bool;
}

/// The error type produced by constructions.
#[derive(Debug, Clone, Error)]
pub enum ConstructionError {
    /// Generic failure; retriability is inherited from whatever failed.
    #[error("{message}")]
    Construction {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// Whether a retry may succeed.
        retriable: bool,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// The construction exceeded its time budget.
    #[error("{message}")]
    Timeout {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// The budget that elapsed, if known.
        timeout_ms: Option<u64>,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// The construction was cancelled.
    #[error("{message}")]
    Cancelled {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// Cancellation reason, if one was given.
        reason: Option<String>,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// The input was rejected.
    #[error("{message}")]
    InvalidInput {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// The offending input field, if the failure is field-scoped.
        field: Option<String>,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// A capability the construction needs was not available.
    #[error("{message}")]
    CapabilityMissing {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// The missing capability.
        required_capability: String,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// A model provider call failed.
    #[error("{message}")]
    Llm {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// Model identifier.
        model: Option<String>,
        /// Provider identifier.
        provider: Option<String>,
        /// Underlying cause.
        #[source]
        cause: Option<SharedError>,
    },

    /// A strict fixpoint revisited a state.
    #[error("{message}")]
    CycleDetected {
        /// Originating construction.
        construction_id: String,
        /// Human-readable message.
        message: String,
        /// Iteration at which the repeat was observed.
        iteration: usize,
        /// Hash of the repeated state.
        state_hash: String,
    },
}

impl ConstructionError {
    /// Creates a generic, non-retriable construction error.
    #[must_use]
    pub fn new(construction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            construction_id: construction_id.into(),
            message: message.into(),
            retriable: false,
            cause: None,
        }
    }

    /// Creates a generic, retriable construction error.
    #[must_use]
    pub fn retriable(construction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            construction_id: construction_id.into(),
            message: message.into(),
            retriable: true,
            cause: None,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(construction_id: impl Into<String>, timeout_ms: u64) -> Self {
        let construction_id = construction_id.into();
        Self::Timeout {
            message: format!("Construction '{construction_id}' timed out after {timeout_ms}ms"),
            construction_id,
            timeout_ms: Some(timeout_ms),
            cause: None,
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(construction_id: impl Into<String>, reason: Option<String>) -> Self {
        let construction_id = construction_id.into();
        let message = match &reason {
            Some(reason) => format!("Construction '{construction_id}' was cancelled: {reason}"),
            None => format!("Construction '{construction_id}' was cancelled"),
        };
        Self::Cancelled {
            construction_id,
            message,
            reason,
            cause: None,
        }
    }

    /// Creates an input validation error.
    #[must_use]
    pub fn invalid_input(construction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            construction_id: construction_id.into(),
            message: message.into(),
            field: None,
            cause: None,
        }
    }

    /// Creates an input validation error scoped to one field.
    #[must_use]
    pub fn invalid_field(
        construction_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            construction_id: construction_id.into(),
            message: message.into(),
            field: Some(field.into()),
            cause: None,
        }
    }

    /// Creates a missing-capability error.
    #[must_use]
    pub fn capability_missing(
        construction_id: impl Into<String>,
        required_capability: impl Into<String>,
    ) -> Self {
        let required_capability = required_capability.into();
        Self::CapabilityMissing {
            construction_id: construction_id.into(),
            message: format!("Required capability '{required_capability}' is not available"),
            required_capability,
            cause: None,
        }
    }

    /// Creates a model provider error.
    #[must_use]
    pub fn llm(construction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Llm {
            construction_id: construction_id.into(),
            message: message.into(),
            model: None,
            provider: None,
            cause: None,
        }
    }

    /// Creates a strict-mode fixpoint cycle error.
    #[must_use]
    pub fn cycle_detected(
        construction_id: impl Into<String>,
        iteration: usize,
        state_hash: impl Into<String>,
    ) -> Self {
        let construction_id = construction_id.into();
        Self::CycleDetected {
            message: format!(
                "Fixpoint '{construction_id}' revisited a previous state at iteration {iteration}"
            ),
            construction_id,
            iteration,
            state_hash: state_hash.into(),
        }
    }

    /// Sets the model and provider on an [`ConstructionError::Llm`] error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, provider: Option<String>) -> Self {
        if let Self::Llm {
            model: ref mut m,
            provider: ref mut p,
            ..
        } = self
        {
            *m = Some(model.into());
            *p = provider;
        }
        self
    }

    /// Attaches an underlying cause. Cycle errors carry no cause.
    #[must_use]
    pub fn with_cause(mut self, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        let shared: SharedError = Arc::new(error);
        match &mut self {
            Self::Construction { cause, .. }
            | Self::Timeout { cause, .. }
            | Self::Cancelled { cause, .. }
            | Self::InvalidInput { cause, .. }
            | Self::CapabilityMissing { cause, .. }
            | Self::Llm { cause, .. } => *cause = Some(shared),
            Self::CycleDetected { .. } => {}
        }
        self
    }

    /// Normalizes an executor error into a construction error.
    ///
    /// An error that already is a `ConstructionError` is kept as-is; anything
    /// else becomes a non-retriable generic error tagged with `construction_id`.
    #[must_use]
    pub fn from_executor_error(construction_id: &str, error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(known) => known,
            Err(other) => {
                let message = other.to_string();
                let cause: Box<dyn std::error::Error + Send + Sync + 'static> = other.into();
                Self::Construction {
                    construction_id: construction_id.to_string(),
                    message,
                    retriable: false,
                    cause: Some(Arc::from(cause)),
                }
            }
        }
    }

    /// Normalizes a panic payload caught from an executor.
    #[must_use]
    pub fn from_panic(construction_id: &str, payload: &(dyn Any + Send)) -> Self {
        Self::new(
            construction_id,
            format!("Executor panicked: {}", panic_message(payload)),
        )
    }

    /// Returns the id of the construction that raised the error.
    #[must_use]
    pub fn construction_id(&self) -> &str {
        match self {
            Self::Construction { construction_id, .. }
            | Self::Timeout { construction_id, .. }
            | Self::Cancelled { construction_id, .. }
            | Self::InvalidInput { construction_id, .. }
            | Self::CapabilityMissing { construction_id, .. }
            | Self::Llm { construction_id, .. }
            | Self::CycleDetected { construction_id, .. } => construction_id,
        }
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Construction { message, .. }
            | Self::Timeout { message, .. }
            | Self::Cancelled { message, .. }
            | Self::InvalidInput { message, .. }
            | Self::CapabilityMissing { message, .. }
            | Self::Llm { message, .. }
            | Self::CycleDetected { message, .. } => message,
        }
    }

    /// Returns the underlying cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&SharedError> {
        match self {
            Self::Construction { cause, .. }
            | Self::Timeout { cause, .. }
            | Self::Cancelled { cause, .. }
            | Self::InvalidInput { cause, .. }
            | Self::CapabilityMissing { cause, .. }
            | Self::Llm { cause, .. } => cause.as_ref(),
            Self::CycleDetected { .. } => None,
        }
    }

    /// Returns the classification kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Construction { .. } => ErrorKind::ConstructionError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidInput { .. } => ErrorKind::InputError,
            Self::CapabilityMissing { .. } => ErrorKind::CapabilityMissing,
            Self::Llm { .. } => ErrorKind::LlmError,
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
        }
    }
}

impl Retriable for ConstructionError {
    fn is_retriable(&self) -> bool {
        match self {
            Self::Construction { retriable, .. } => *retriable,
            Self::Timeout { .. } | Self::Llm { .. } => true,
            Self::Cancelled { .. }
            | Self::InvalidInput { .. }
            | Self::CapabilityMissing { .. }
            | Self::CycleDetected { .. } => false,
        }
    }
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Error raised when configuration is invalid or cannot be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds an invalid value.
    #[error("Invalid configuration for '{field}': {message}")]
    Invalid {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an invalid-field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

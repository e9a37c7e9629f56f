//! Failure classification.

use super::suggestions::suggestions_for;
use crate::errors::{panic_message, ConstructionError, ErrorKind, Retriable};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::error::Error;

/// A classified, human-readable explanation of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureHint {
    /// Classification kind.
    pub kind: ErrorKind,
    /// Construction the failure is attributed to.
    pub construction_id: String,
    /// Human-readable message.
    pub message: String,
    /// Whether a retry may succeed.
    pub retriable: bool,
    /// Remediation steps.
    pub suggestions: Vec<String>,
    /// Display string of the underlying cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Classifies any error into a [`FailureHint`].
///
/// The error's `source()` chain is searched for a [`ConstructionError`];
/// the first one found determines the kind. Anything else is `unknown`,
/// attributed to `default_id`.
#[must_use]
pub fn explain_construction_failure(error: &(dyn Error + 'static), default_id: &str) -> FailureHint {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(known) = err.downcast_ref::<ConstructionError>() {
            return explain_known(known, default_id);
        }
        current = err.source();
    }

    FailureHint {
        kind: ErrorKind::Unknown,
        construction_id: default_id.to_string(),
        message: error.to_string(),
        retriable: false,
        suggestions: suggestions_for(ErrorKind::Unknown),
        cause: error.source().map(ToString::to_string),
    }
}

/// Classifies a panic payload caught from an executor.
#[must_use]
pub fn explain_panic(payload: &(dyn Any + Send), default_id: &str) -> FailureHint {
    FailureHint {
        kind: ErrorKind::Unknown,
        construction_id: default_id.to_string(),
        message: panic_message(payload),
        retriable: false,
        suggestions: suggestions_for(ErrorKind::Unknown),
        cause: None,
    }
}

fn explain_known(error: &ConstructionError, default_id: &str) -> FailureHint {
    let kind = error.kind();
    let mut suggestions = suggestions_for(kind);

    match error {
        ConstructionError::InvalidInput {
            field: Some(field), ..
        } => suggestions.insert(0, format!("Check the '{field}' field of the input")),
        ConstructionError::CapabilityMissing {
            required_capability,
            ..
        } => suggestions.insert(0, format!("Register the '{required_capability}' capability")),
        ConstructionError::Llm {
            model: Some(model), ..
        } => suggestions.push(format!("Check that model '{model}' is available")),
        ConstructionError::Timeout {
            timeout_ms: Some(ms),
            ..
        } => suggestions.push(format!("The elapsed budget was {ms}ms")),
        _ => {}
    }

    let construction_id = if error.construction_id().is_empty() {
        default_id
    } else {
        error.construction_id()
    };

    FailureHint {
        kind,
        construction_id: construction_id.to_string(),
        message: error.message().to_string(),
        retriable: error.is_retriable(),
        suggestions,
        cause: error.cause().map(ToString::to_string),
    }
}

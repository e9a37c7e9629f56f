//! Remediation hints per failure kind.

use crate::errors::ErrorKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::LazyLock;

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

static SUGGESTIONS: LazyLock<RwLock<HashMap<ErrorKind, Vec<String>>>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    map.insert(
        ErrorKind::Timeout,
        steps(&[
            "Increase the timeout budget for this construction",
            "Wrap the construction with with_retry; timeouts are retriable",
            "Check whether the upstream provider is degraded",
        ]),
    );
    map.insert(
        ErrorKind::Cancelled,
        steps(&[
            "Check which caller cancelled the execution context",
            "Do not retry: cancellation is terminal",
        ]),
    );
    map.insert(
        ErrorKind::InputError,
        steps(&[
            "Validate the input before invoking the construction",
            "Check the upstream construction's output shape",
        ]),
    );
    map.insert(
        ErrorKind::CapabilityMissing,
        steps(&[
            "Provide the missing capability through the execution context",
            "Or route to a construction that does not require it",
        ]),
    );
    map.insert(
        ErrorKind::LlmError,
        steps(&[
            "Retry with backoff; provider errors are usually transient",
            "Add a fallback to a different model or provider",
            "Check provider quotas and credentials",
        ]),
    );
    map.insert(
        ErrorKind::ConstructionError,
        steps(&[
            "Inspect the error cause for the underlying failure",
            "Run the construction with debug() to see the failing step",
        ]),
    );
    map.insert(
        ErrorKind::CycleDetected,
        steps(&[
            "Check that the fixpoint body makes progress on every iteration",
            "Allow monotone violations to report cycles instead of failing",
        ]),
    );
    map.insert(
        ErrorKind::Unknown,
        steps(&["Inspect the error message; it did not originate from a construction"]),
    );

    RwLock::new(map)
});

/// Replaces the suggestions registered for `kind`.
pub fn register_suggestions(kind: ErrorKind, fix_steps: Vec<String>) {
    SUGGESTIONS.write().insert(kind, fix_steps);
}

/// Returns the suggestions registered for `kind`.
#[must_use]
pub fn suggestions_for(kind: ErrorKind) -> Vec<String> {
    SUGGESTIONS.read().get(&kind).cloned().unwrap_or_default()
}

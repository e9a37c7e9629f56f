//! Static confidence hints and the aggregation contract.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A static confidence hint, independent of any execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceEstimate {
    value: f64,
    basis: String,
}

impl ConfidenceEstimate {
    /// Creates an estimate; the value is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(value: f64, basis: impl Into<String>) -> Self {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        Self {
            value,
            basis: basis.into(),
        }
    }

    /// The confidence value in `[0, 1]`.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Where the estimate comes from.
    #[must_use]
    pub fn basis(&self) -> &str {
        &self.basis
    }
}

/// Combines confidence estimates of constructions run in sequence.
pub trait ConfidenceAggregator: Send + Sync + Debug {
    /// Combines estimates, given in execution order.
    fn sequence(&self, estimates: &[ConfidenceEstimate]) -> ConfidenceEstimate;
}

/// Treats steps as independent and multiplies their confidences.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductAggregator;

impl ConfidenceAggregator for ProductAggregator {
    fn sequence(&self, estimates: &[ConfidenceEstimate]) -> ConfidenceEstimate {
        sequence_confidence(estimates)
    }
}

/// Default sequential aggregation: the product of all values.
#[must_use]
pub fn sequence_confidence(estimates: &[ConfidenceEstimate]) -> ConfidenceEstimate {
    let value: f64 = estimates.iter().map(ConfidenceEstimate::value).product();
    let basis = estimates
        .iter()
        .map(ConfidenceEstimate::basis)
        .collect::<Vec<_>>()
        .join(", ");
    ConfidenceEstimate::new(value, format!("sequence({basis})"))
}

/// States that may carry a numeric confidence, penalized by `fix` on
/// monotonicity regressions.
///
/// Both methods default to "no confidence", so opting out is an empty impl.
pub trait HasConfidence {
    /// Returns the current confidence, if the state carries one.
    fn confidence(&self) -> Option<f64> {
        None
    }

    /// Replaces the confidence. Ignored by states without one.
    fn set_confidence(&mut self, _confidence: f64) {}
}

impl HasConfidence for serde_json::Value {
    fn confidence(&self) -> Option<f64> {
        self.get("confidence").and_then(serde_json::Value::as_f64)
    }

    fn set_confidence(&mut self, confidence: f64) {
        if let Some(slot) = self.get_mut("confidence") {
            if slot.is_number() {
                *slot = serde_json::json!(confidence);
            }
        }
    }
}

//! Evidence records.

use serde::{Deserialize, Serialize};

/// What an evidence entry reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationPayload {
    /// Payload discriminator, `monotone_violation`.
    #[serde(rename = "type")]
    pub payload_type: String,
    /// The fixpoint that observed the violation.
    pub construction_id: String,
    /// Iteration that produced the regressing state.
    pub iteration: usize,
    /// Measure before the iteration.
    pub previous_measure: f64,
    /// Measure after the iteration.
    pub next_measure: f64,
}

/// Where an evidence entry comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source of the observation.
    pub source: String,
    /// Operator that produced it.
    pub method: String,
}

/// A structured observation appended to an [`super::EvidenceLedger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    /// Entry kind, `outcome`.
    pub kind: String,
    /// The observation.
    pub payload: ViolationPayload,
    /// Where it comes from.
    pub provenance: Provenance,
    /// Session of the execution context.
    pub session_id: String,
}

impl EvidenceEntry {
    /// A monotone-progress violation observed by a fixpoint.
    #[must_use]
    pub fn monotone_violation(
        construction_id: &str,
        iteration: usize,
        previous_measure: f64,
        next_measure: f64,
        session_id: &str,
    ) -> Self {
        Self {
            kind: "outcome".to_string(),
            payload: ViolationPayload {
                payload_type: "monotone_violation".to_string(),
                construction_id: construction_id.to_string(),
                iteration,
                previous_measure,
                next_measure,
            },
            provenance: Provenance {
                source: "system_observation".to_string(),
                method: "operators.fix".to_string(),
            },
            session_id: session_id.to_string(),
        }
    }
}

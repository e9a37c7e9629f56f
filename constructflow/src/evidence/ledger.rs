//! Evidence ledger trait and implementations.

use super::entry::EvidenceEntry;
use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

/// Error returned by a ledger that could not record an entry.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The ledger backend is unreachable.
    #[error("Evidence ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the entry.
    #[error("Evidence entry rejected: {0}")]
    Rejected(String),
}

/// Append-only store of evidence produced during execution.
///
/// Provided to constructions through
/// [`crate::context::ExecutionContext::with_evidence_ledger`]. Its absence
/// is tolerated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceLedger: Send + Sync {
    /// Appends an entry.
    async fn append(&self, entry: EvidenceEntry) -> Result<(), LedgerError>;
}

/// A ledger that discards all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLedger;

#[async_trait]
impl EvidenceLedger for NoOpLedger {
    async fn append(&self, _entry: EvidenceEntry) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// A ledger that logs entries through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLedger;

#[async_trait]
impl EvidenceLedger for LoggingLedger {
    async fn append(&self, entry: EvidenceEntry) -> Result<(), LedgerError> {
        info!(
            kind = %entry.kind,
            payload_type = %entry.payload.payload_type,
            construction_id = %entry.payload.construction_id,
            iteration = entry.payload.iteration,
            previous_measure = entry.payload.previous_measure,
            next_measure = entry.payload.next_measure,
            session_id = %entry.session_id,
            "Evidence recorded"
        );
        Ok(())
    }
}

/// A ledger that keeps entries in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingLedger {
    entries: RwLock<Vec<EvidenceEntry>>,
}

impl CollectingLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<EvidenceEntry> {
        self.entries.read().clone()
    }

    /// Returns the number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears all recorded entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[async_trait]
impl EvidenceLedger for CollectingLedger {
    async fn append(&self, entry: EvidenceEntry) -> Result<(), LedgerError> {
        self.entries.write().push(entry);
        Ok(())
    }
}

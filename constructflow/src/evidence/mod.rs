//! Evidence ledger boundary.
//!
//! Fixpoints report monotone-progress violations here when a ledger is
//! available in the execution context.

mod entry;
mod ledger;

pub use entry::{EvidenceEntry, Provenance, ViolationPayload};
#[cfg(test)]
pub use ledger::MockEvidenceLedger;
pub use ledger::{CollectingLedger, EvidenceLedger, LedgerError, LoggingLedger, NoOpLedger};

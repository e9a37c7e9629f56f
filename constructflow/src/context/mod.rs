//! Execution context management.
//!
//! This module provides:
//! - The execution context threaded through every construction
//! - The typed dependency bag merged by `provide`

#[cfg(test)]
mod context_tests;
mod dependencies;
mod execution;

pub use dependencies::{Dependencies, EVIDENCE_LEDGER};
pub use execution::{caller_context, ExecutionContext};

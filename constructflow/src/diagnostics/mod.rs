//! Failure explanation and execution tracing.
//!
//! - [`explain_construction_failure`] classifies any error into a [`FailureHint`]
//! - [`WithDiagnostics`] records trace steps for a wrapped construction
//! - [`Debugged`] owns the trace of one top-level call

mod explain;
mod suggestions;
mod trace;
mod wrapper;

pub use explain::{explain_construction_failure, explain_panic, FailureHint};
pub use suggestions::{register_suggestions, suggestions_for};
pub use trace::{ExecutionTrace, StepStatus, StepTimer, TraceRecorder, TraceStep};
pub use wrapper::{DebugOptions, Debugged, WithDiagnostics};

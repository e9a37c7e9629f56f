//! # Constructflow
//!
//! A small runtime for composing fallible, asynchronous units of work
//! ("constructions") out of algebraic combinators.
//!
//! Constructflow provides:
//!
//! - **Typed outcomes**: success, or failure with a partial result and the id
//!   of the construction that failed
//! - **Combinators**: sequencing, concurrent fan-out, fallback, retry with
//!   backoff, timeouts and input/output adapters
//! - **Selective execution**: branches whose cost bounds, possible paths and
//!   dependency sets are known before anything runs
//! - **Fixpoints**: convergence loops with monotonicity checks, cycle
//!   detection and explicit termination reasons
//! - **Diagnostics**: per-call execution traces and failure explanations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use constructflow::prelude::*;
//!
//! let parse = atom("parse", |s: String, _ctx| async move { anyhow::Ok(s.trim().len()) });
//! let double = atom("double", |n: usize, _ctx| async move { anyhow::Ok(n * 2) });
//!
//! let pipeline = seq(parse, with_retry(double, RetryConfig::default()))
//!     .debug(DebugOptions::default());
//!
//! let outcome = pipeline.execute("  hello ".to_string(), None).await;
//! assert_eq!(outcome.into_value(), Some(10));
//! assert_eq!(pipeline.last_trace().unwrap().steps.len(), 4);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod combinators;
pub mod config;
pub mod constructions;
pub mod context;
pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod evidence;
pub mod observability;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::combinators::{
        branch, contramap, dimap, fallback, fanout, fix, map, map_async, map_error, provide,
        select, seq, with_retry, with_timeout, FixConfig, FixMetric, Fixpoint, FixpointMetadata,
        JitterStrategy, RetryConfig, TerminationReason,
    };
    pub use crate::config::EngineConfig;
    pub use crate::constructions::{
        atom, atom_outcome, identity, Construction, ConstructionExt, SelectiveConstruction,
    };
    pub use crate::context::{Dependencies, ExecutionContext};
    pub use crate::core::{
        Bounds, ConfidenceAggregator, ConfidenceEstimate, ConstructionOutcome, CostSemiring,
        Either, HasConfidence, Partial, ProductAggregator,
    };
    pub use crate::diagnostics::{
        explain_construction_failure, DebugOptions, Debugged, ExecutionTrace, FailureHint,
        StepStatus, TraceStep,
    };
    pub use crate::errors::{ConfigError, ConstructionError, ErrorKind, Retriable};
    pub use crate::evidence::{
        CollectingLedger, EvidenceEntry, EvidenceLedger, LedgerError, LoggingLedger, NoOpLedger,
    };
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
}

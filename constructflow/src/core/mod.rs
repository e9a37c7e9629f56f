//! Core value types for constructions.
//!
//! This module contains:
//! - The success/failure outcome algebra with partial results
//! - The bounded cost semiring
//! - Static confidence hints and their aggregation contract
//! - The `Either` type used by selective combinators

mod confidence;
mod cost;
mod either;
mod outcome;

pub use confidence::{
    sequence_confidence, ConfidenceAggregator, ConfidenceEstimate, HasConfidence,
    ProductAggregator,
};
pub use cost::{Bounds, CostSemiring, ResourceUsage};
pub use either::Either;
pub use outcome::{ConstructionOutcome, Partial};

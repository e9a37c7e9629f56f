//! Construction traits and leaf constructions.
//!
//! A construction is a named, identifiable unit of asynchronous work. The
//! static surface (identity, cost bounds, possible paths, dependency sets)
//! lives on [`SelectiveConstruction`] so it can be inspected without
//! knowing a construction's input and output types; [`Construction`] adds
//! execution on top.

mod atom;

pub use atom::{atom, atom_outcome, identity, Atom, AtomOutcome, Identity, LeafConstruction, LeafMeta};

use crate::context::ExecutionContext;
use crate::core::{ConfidenceEstimate, ConstructionOutcome, CostSemiring};
use crate::diagnostics::{explain_construction_failure, DebugOptions, Debugged, FailureHint};
use crate::errors::ConstructionError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Static, execution-free surface of a construction.
///
/// The defaults describe a leaf: zero cost, a single-step path made of the
/// construction's own id, and that id as its only dependency.
pub trait SelectiveConstruction: Send + Sync {
    /// Stable identifier used for trace correlation and dependency sets.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str {
        self.id()
    }

    /// Static confidence hint, if the construction has one.
    fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
        None
    }

    /// Best-case resource usage.
    fn min_cost(&self) -> CostSemiring {
        CostSemiring::zero()
    }

    /// Worst-case resource usage.
    fn max_cost(&self) -> CostSemiring {
        CostSemiring::zero()
    }

    /// Every sequence of leaf ids an execution may visit.
    fn possible_paths(&self) -> Vec<Vec<String>> {
        vec![vec![self.id().to_string()]]
    }

    /// Leaf ids that may be executed.
    fn dependency_set_upper(&self) -> BTreeSet<String> {
        BTreeSet::from([self.id().to_string()])
    }

    /// Leaf ids that are always executed.
    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.dependency_set_upper()
    }
}

/// An executable construction from `I` to `O`, failing with `E`.
#[async_trait]
pub trait Construction<I, O, E = ConstructionError>: SelectiveConstruction {
    /// Executes the construction.
    ///
    /// `ctx` is optional; constructions that need dependencies fail when it
    /// is absent.
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E>;

    /// Explains a failure produced by this construction.
    fn why_failed(&self, error: &E) -> FailureHint
    where
        E: std::error::Error + 'static,
    {
        explain_construction_failure(error, self.id())
    }
}

/// Extension methods available on every construction.
pub trait ConstructionExt: SelectiveConstruction + Sized {
    /// Wraps the construction so each top-level call records an
    /// [`crate::diagnostics::ExecutionTrace`], available via
    /// [`Debugged::last_trace`].
    #[must_use]
    fn debug(self, options: DebugOptions) -> Debugged<Self> {
        Debugged::new(self, options)
    }

    /// Shares the construction so it can appear in several compositions.
    #[must_use]
    fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl<C: SelectiveConstruction> ConstructionExt for C {}

impl<C: SelectiveConstruction + ?Sized> SelectiveConstruction for Arc<C> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
        (**self).estimated_confidence()
    }

    fn min_cost(&self) -> CostSemiring {
        (**self).min_cost()
    }

    fn max_cost(&self) -> CostSemiring {
        (**self).max_cost()
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        (**self).possible_paths()
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        (**self).dependency_set_upper()
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        (**self).dependency_set_lower()
    }
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for Arc<C>
where
    C: Construction<I, O, E> + ?Sized,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        (**self).execute(input, ctx).await
    }

    fn why_failed(&self, error: &E) -> FailureHint
    where
        E: std::error::Error + 'static,
    {
        (**self).why_failed(error)
    }
}

//! Trace-recording wrappers.

use super::explain::FailureHint;
use super::trace::{ExecutionTrace, StepStatus, StepTimer, TraceRecorder, TraceStep};
use crate::constructions::{Construction, LeafConstruction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConfidenceEstimate, ConstructionOutcome, CostSemiring};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Options for [`crate::constructions::ConstructionExt::debug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOptions {
    /// Record successful steps as well as failing ones.
    pub include_successful_steps: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            include_successful_steps: true,
        }
    }
}

impl DebugOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether successful steps are recorded.
    #[must_use]
    pub const fn with_include_successful_steps(mut self, include: bool) -> Self {
        self.include_successful_steps = include;
        self
    }
}

macro_rules! delegate_selective {
    ($field:ident) => {
        fn id(&self) -> &str {
            self.$field.id()
        }

        fn name(&self) -> &str {
            self.$field.name()
        }

        fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
            self.$field.estimated_confidence()
        }

        fn min_cost(&self) -> CostSemiring {
            self.$field.min_cost()
        }

        fn max_cost(&self) -> CostSemiring {
            self.$field.max_cost()
        }

        fn possible_paths(&self) -> Vec<Vec<String>> {
            self.$field.possible_paths()
        }

        fn dependency_set_upper(&self) -> BTreeSet<String> {
            self.$field.dependency_set_upper()
        }

        fn dependency_set_lower(&self) -> BTreeSet<String> {
            self.$field.dependency_set_lower()
        }
    };
}

/// Records a trace step for the wrapped construction whenever the
/// execution context carries a trace recorder.
///
/// Every combinator returns its result wrapped in this type.
#[derive(Debug, Clone)]
pub struct WithDiagnostics<C> {
    inner: C,
}

impl<C> WithDiagnostics<C> {
    /// Wraps a construction.
    #[must_use]
    pub const fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Returns the wrapped construction.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwraps the construction.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: LeafConstruction> WithDiagnostics<C> {
    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.inner.meta_mut().set_name(name);
        self
    }

    /// Attaches a static cost estimate.
    #[must_use]
    pub fn with_cost(mut self, best: CostSemiring, worst: CostSemiring) -> Self {
        self.inner.meta_mut().set_cost(best, worst);
        self
    }

    /// Attaches a static confidence estimate.
    #[must_use]
    pub fn with_confidence(mut self, confidence: ConfidenceEstimate) -> Self {
        self.inner.meta_mut().set_confidence(confidence);
        self
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for WithDiagnostics<C> {
    delegate_selective!(inner);
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for WithDiagnostics<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let Some(recorder) = ctx.and_then(ExecutionContext::trace).cloned() else {
            return self.inner.execute(input, ctx).await;
        };

        let timer = StepTimer::start();
        let outcome = self.inner.execute(input, ctx).await;
        let status = if outcome.is_success() {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        };
        if !recorder.records(status) {
            return outcome;
        }

        let hint = outcome.error().map(|error| self.inner.why_failed(error));
        let step = TraceStep {
            construction_id: self.inner.id().to_string(),
            construction_name: self.inner.name().to_string(),
            started_at: timer.started_at(),
            finished_at: Utc::now(),
            duration_ms: timer.elapsed_ms(),
            status,
            input_type: std::any::type_name::<I>().to_string(),
            output_type: outcome
                .is_success()
                .then(|| std::any::type_name::<O>().to_string()),
            error_kind: hint.as_ref().map(|h| h.kind),
            error_message: hint.map(|h| h.message),
        };
        debug!(
            construction_id = %step.construction_id,
            status = ?step.status,
            duration_ms = step.duration_ms,
            "Recorded trace step"
        );
        recorder.record(step);
        outcome
    }

    fn why_failed(&self, error: &E) -> FailureHint
    where
        E: std::error::Error + 'static,
    {
        self.inner.why_failed(error)
    }
}

/// A construction whose every top-level call records an [`ExecutionTrace`].
///
/// Each call installs a fresh recorder into a per-call copy of the context,
/// so concurrent calls never share one. The trace of the most recent call
/// is kept until the next call overwrites it.
pub struct Debugged<C> {
    inner: C,
    options: DebugOptions,
    last_trace: RwLock<Option<ExecutionTrace>>,
}

impl<C> Debugged<C> {
    /// Wraps a construction.
    #[must_use]
    pub fn new(inner: C, options: DebugOptions) -> Self {
        Self {
            inner,
            options,
            last_trace: RwLock::new(None),
        }
    }

    /// Returns the options in effect.
    #[must_use]
    pub const fn options(&self) -> DebugOptions {
        self.options
    }

    /// Returns the trace of the most recent completed call.
    #[must_use]
    pub fn last_trace(&self) -> Option<ExecutionTrace> {
        self.last_trace.read().clone()
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Debugged<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugged")
            .field("inner", &self.inner)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for Debugged<C> {
    delegate_selective!(inner);
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for Debugged<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let recorder = Arc::new(TraceRecorder::new(self.options.include_successful_steps));
        let traced = match ctx {
            Some(ctx) => ctx.with_trace(Arc::clone(&recorder)),
            None => ExecutionContext::trace_only(Arc::clone(&recorder)),
        };

        let timer = StepTimer::start();
        let outcome = self.inner.execute(input, Some(&traced)).await;
        let trace = recorder.finish(
            self.inner.id(),
            self.inner.name(),
            &timer,
            outcome.is_failure(),
        );
        *self.last_trace.write() = Some(trace);
        outcome
    }

    fn why_failed(&self, error: &E) -> FailureHint
    where
        E: std::error::Error + 'static,
    {
        self.inner.why_failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructions::{atom, ConstructionExt};
    use crate::errors::{ConstructionError, ErrorKind};

    fn parse() -> impl Construction<String, u32> {
        atom("parse", |s: String, _ctx| async move {
            s.trim()
                .parse::<u32>()
                .map_err(|e| anyhow::Error::new(ConstructionError::invalid_input("parse", e.to_string())))
        })
    }

    #[tokio::test]
    async fn test_untraced_execution_records_nothing() {
        let leaf = parse();
        let outcome = leaf.execute("7".to_string(), None).await;
        assert_eq!(outcome.into_value(), Some(7));
    }

    #[tokio::test]
    async fn test_debug_records_success_step() {
        let debugged = parse().debug(DebugOptions::default());
        assert!(debugged.last_trace().is_none());

        let outcome = debugged.execute("7".to_string(), None).await;
        assert!(outcome.is_success());

        let trace = debugged.last_trace().unwrap();
        assert_eq!(trace.root_construction_id, "parse");
        assert!(!trace.failed);
        assert_eq!(trace.steps.len(), 1);
        let step = &trace.steps[0];
        assert_eq!(step.status, StepStatus::Succeeded);
        assert_eq!(step.input_type, std::any::type_name::<String>());
        assert_eq!(step.output_type.as_deref(), Some("u32"));
    }

    #[tokio::test]
    async fn test_debug_records_failure_kind() {
        let debugged = parse().debug(DebugOptions::default());
        let outcome = debugged.execute("seven".to_string(), None).await;
        assert!(outcome.is_failure());

        let trace = debugged.last_trace().unwrap();
        assert!(trace.failed);
        let step = trace.failures().next().unwrap();
        assert_eq!(step.error_kind, Some(ErrorKind::InputError));
        assert!(step.error_message.is_some());
        assert!(step.output_type.is_none());
    }

    #[tokio::test]
    async fn test_failures_only() {
        let debugged = parse().debug(DebugOptions::new().with_include_successful_steps(false));
        let _ = debugged.execute("1".to_string(), None).await;
        assert!(debugged.last_trace().unwrap().steps.is_empty());
    }

    #[tokio::test]
    async fn test_next_call_overwrites_trace() {
        let debugged = parse().debug(DebugOptions::default());
        let _ = debugged.execute("x".to_string(), None).await;
        assert!(debugged.last_trace().unwrap().failed);
        let _ = debugged.execute("1".to_string(), None).await;
        assert!(!debugged.last_trace().unwrap().failed);
    }

    #[tokio::test]
    async fn test_trace_only_context_is_hidden_from_executors() {
        let sees_ctx = atom("sees_ctx", |_: (), ctx: Option<ExecutionContext>| async move {
            anyhow::Ok(ctx.is_some())
        })
        .debug(DebugOptions::default());

        assert_eq!(sees_ctx.execute((), None).await.into_value(), Some(false));
        let ctx = ExecutionContext::new();
        assert_eq!(sees_ctx.execute((), Some(&ctx)).await.into_value(), Some(true));
        assert!(ctx.trace().is_none());
    }
}

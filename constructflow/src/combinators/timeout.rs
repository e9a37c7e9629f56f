//! Deadline enforcement.

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConstructionOutcome, CostSemiring};
use crate::diagnostics::WithDiagnostics;
use crate::errors::ConstructionError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Fails with a timeout error when the wrapped construction does not
/// finish within `duration`.
pub struct WithTimeout<C> {
    id: String,
    inner: C,
    duration: Duration,
}

impl<C> std::fmt::Debug for WithTimeout<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithTimeout")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl<C> WithTimeout<C> {
    fn budget_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for WithTimeout<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn estimated_confidence(&self) -> Option<crate::core::ConfidenceEstimate> {
        self.inner.estimated_confidence()
    }

    fn min_cost(&self) -> CostSemiring {
        let mut cost = self.inner.min_cost();
        cost.latency_ms = cost.latency_ms.cap(self.budget_ms());
        cost
    }

    fn max_cost(&self) -> CostSemiring {
        let mut cost = self.inner.max_cost();
        cost.latency_ms = cost.latency_ms.cap(self.budget_ms());
        cost
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        self.inner.possible_paths()
    }

    fn dependency_set_upper(&self) -> std::collections::BTreeSet<String> {
        self.inner.dependency_set_upper()
    }

    fn dependency_set_lower(&self) -> std::collections::BTreeSet<String> {
        self.inner.dependency_set_lower()
    }
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for WithTimeout<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: From<ConstructionError> + Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        match tokio::time::timeout(self.duration, self.inner.execute(input, ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let budget_ms = self.budget_ms();
                warn!(construction_id = %self.id, budget_ms, "Construction timed out");
                ConstructionOutcome::failure_at(
                    ConstructionError::timeout(self.id.as_str(), budget_ms).into(),
                    self.id.as_str(),
                )
            }
        }
    }
}

/// Bounds the execution time of `inner`. An elapsed deadline surfaces as a
/// retriable timeout error.
pub fn with_timeout<I, O, E, C>(inner: C, duration: Duration) -> WithDiagnostics<WithTimeout<C>>
where
    C: Construction<I, O, E>,
{
    WithDiagnostics::new(WithTimeout {
        id: format!("timeout({})", inner.id()),
        inner,
        duration,
    })
}

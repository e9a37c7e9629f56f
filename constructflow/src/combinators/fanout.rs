//! Concurrent composition over a shared input.

use super::{concat_paths, sequence_pair, union};
use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{
    ConfidenceAggregator, ConfidenceEstimate, ConstructionOutcome, CostSemiring, ProductAggregator,
};
use crate::diagnostics::WithDiagnostics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Runs `left` and `right` concurrently on clones of the same input.
pub struct Fanout<L, R> {
    id: String,
    name: String,
    left: L,
    right: R,
    aggregator: Arc<dyn ConfidenceAggregator>,
}

impl<L, R> std::fmt::Debug for Fanout<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<L, R> SelectiveConstruction for Fanout<L, R>
where
    L: SelectiveConstruction,
    R: SelectiveConstruction,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
        sequence_pair(
            self.aggregator.as_ref(),
            self.left.estimated_confidence(),
            self.right.estimated_confidence(),
        )
    }

    fn min_cost(&self) -> CostSemiring {
        self.left.min_cost().concurrent(&self.right.min_cost())
    }

    fn max_cost(&self) -> CostSemiring {
        self.left.max_cost().concurrent(&self.right.max_cost())
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        concat_paths(&self.left.possible_paths(), &self.right.possible_paths())
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        union(
            self.left.dependency_set_upper(),
            self.right.dependency_set_upper(),
        )
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        union(
            self.left.dependency_set_lower(),
            self.right.dependency_set_lower(),
        )
    }
}

#[async_trait]
impl<I, O1, O2, E, L, R> Construction<I, (O1, O2), E> for Fanout<L, R>
where
    L: Construction<I, O1, E>,
    R: Construction<I, O2, E>,
    I: Clone + Send + 'static,
    O1: Send + 'static,
    O2: Send + 'static,
    E: Send + 'static,
{
    async fn execute(
        &self,
        input: I,
        ctx: Option<&ExecutionContext>,
    ) -> ConstructionOutcome<(O1, O2), E> {
        let (left, right) = futures::future::join(
            self.left.execute(input.clone(), ctx),
            self.right.execute(input, ctx),
        )
        .await;

        match (left, right) {
            (ConstructionOutcome::Success { value: l }, ConstructionOutcome::Success { value: r }) => {
                ConstructionOutcome::success((l, r))
            }
            (
                ConstructionOutcome::Failure {
                    error,
                    partial,
                    error_at,
                },
                _,
            )
            | (
                _,
                ConstructionOutcome::Failure {
                    error,
                    partial,
                    error_at,
                },
            ) => ConstructionOutcome::Failure {
                error,
                partial,
                error_at,
            },
        }
    }
}

/// Concurrent composition returning both values as a pair.
///
/// Both children always run to completion. When both fail, `left`'s
/// failure is reported.
pub fn fanout<I, O1, O2, E, L, R>(left: L, right: R) -> WithDiagnostics<Fanout<L, R>>
where
    L: Construction<I, O1, E>,
    R: Construction<I, O2, E>,
{
    fanout_with_aggregator(left, right, Arc::new(ProductAggregator))
}

/// Concurrent composition with a custom confidence aggregator.
pub fn fanout_with_aggregator<I, O1, O2, E, L, R>(
    left: L,
    right: R,
    aggregator: Arc<dyn ConfidenceAggregator>,
) -> WithDiagnostics<Fanout<L, R>>
where
    L: Construction<I, O1, E>,
    R: Construction<I, O2, E>,
{
    WithDiagnostics::new(Fanout {
        id: format!("fanout({},{})", left.id(), right.id()),
        name: format!("{} &&& {}", left.name(), right.name()),
        left,
        right,
        aggregator,
    })
}

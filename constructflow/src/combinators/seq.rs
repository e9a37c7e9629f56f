//! Sequential composition.

use super::{concat_paths, sequence_pair, union};
use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{
    ConfidenceAggregator, ConfidenceEstimate, ConstructionOutcome, CostSemiring, Partial,
    ProductAggregator,
};
use crate::diagnostics::WithDiagnostics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// Runs `first`, then feeds its value into `second`.
pub struct Seq<A, B, M> {
    id: String,
    name: String,
    first: A,
    second: B,
    aggregator: Arc<dyn ConfidenceAggregator>,
    _mid: PhantomData<fn() -> M>,
}

impl<A, B, M> std::fmt::Debug for Seq<A, B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seq").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<A, B, M> SelectiveConstruction for Seq<A, B, M>
where
    A: SelectiveConstruction,
    B: SelectiveConstruction,
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
            self.first.estimated_confidence(),
            self.second.estimated_confidence(),
        )
    }

    fn min_cost(&self) -> CostSemiring {
        self.first.min_cost().add(&self.second.min_cost())
    }

    fn max_cost(&self) -> CostSemiring {
        self.first.max_cost().add(&self.second.max_cost())
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        concat_paths(&self.first.possible_paths(), &self.second.possible_paths())
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        union(
            self.first.dependency_set_upper(),
            self.second.dependency_set_upper(),
        )
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        union(
            self.first.dependency_set_lower(),
            self.second.dependency_set_lower(),
        )
    }
}

#[async_trait]
impl<I, M, O, E, A, B> Construction<I, O, E> for Seq<A, B, M>
where
    A: Construction<I, M, E>,
    B: Construction<M, O, E>,
    I: Send + 'static,
    M: Clone + Send + Sync + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let mid = match self.first.execute(input, ctx).await {
            ConstructionOutcome::Success { value } => value,
            ConstructionOutcome::Failure {
                error,
                partial,
                error_at,
            } => {
                return ConstructionOutcome::Failure {
                    error,
                    partial,
                    error_at,
                }
            }
        };

        let recovered = mid.clone();
        match self.second.execute(mid, ctx).await {
            ConstructionOutcome::Failure {
                error,
                partial: None,
                error_at,
            } => ConstructionOutcome::Failure {
                error,
                partial: Some(Partial::new(recovered)),
                error_at,
            },
            outcome => outcome,
        }
    }
}

/// Sequential composition with the default product confidence aggregator.
///
/// A failure of `first` is returned verbatim and `second` never runs. A
/// failure of `second` that carries no partial gets `first`'s value as
/// its partial.
pub fn seq<I, M, O, E, A, B>(first: A, second: B) -> WithDiagnostics<Seq<A, B, M>>
where
    A: Construction<I, M, E>,
    B: Construction<M, O, E>,
{
    seq_with_aggregator(first, second, Arc::new(ProductAggregator))
}

/// Sequential composition with a custom confidence aggregator.
pub fn seq_with_aggregator<I, M, O, E, A, B>(
    first: A,
    second: B,
    aggregator: Arc<dyn ConfidenceAggregator>,
) -> WithDiagnostics<Seq<A, B, M>>
where
    A: Construction<I, M, E>,
    B: Construction<M, O, E>,
{
    WithDiagnostics::new(Seq {
        id: format!("seq({},{})", first.id(), second.id()),
        name: format!("{} >>> {}", first.name(), second.name()),
        first,
        second,
        aggregator,
        _mid: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructions::atom;
    use crate::errors::ConstructionError;
    use crate::testing::CountingConstruction;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct MinAggregator;

    impl ConfidenceAggregator for MinAggregator {
        fn sequence(&self, estimates: &[ConfidenceEstimate]) -> ConfidenceEstimate {
            let value = estimates
                .iter()
                .map(ConfidenceEstimate::value)
                .fold(1.0, f64::min);
            ConfidenceEstimate::new(value, "min")
        }
    }

    fn inc(id: &str) -> impl Construction<u32, u32> {
        atom(id.to_string(), |x: u32, _ctx| async move { anyhow::Ok(x + 1) })
    }

    fn fail(id: &str) -> impl Construction<u32, u32> {
        let owned = id.to_string();
        atom(id.to_string(), move |_: u32, _ctx| {
            let owned = owned.clone();
            async move { Err::<u32, anyhow::Error>(ConstructionError::new(owned, "nope").into()) }
        })
    }

    #[tokio::test]
    async fn test_seq_runs_in_order() {
        let pipeline = seq(inc("a"), inc("b"));
        assert_eq!(pipeline.execute(1, None).await.into_value(), Some(3));
        assert_eq!(pipeline.id(), "seq(a,b)");
        assert_eq!(pipeline.name(), "a >>> b");
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let second = Arc::new(CountingConstruction::new(inc("b")));
        let pipeline = seq(fail("a"), Arc::clone(&second));

        let outcome = pipeline.execute(1, None).await;
        assert_eq!(outcome.error_at(), Some("a"));
        assert!(outcome.partial().is_none());
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_failure_keeps_first_value_as_partial() {
        let pipeline = seq(inc("a"), fail("b"));
        let outcome = pipeline.execute(1, None).await;

        assert_eq!(outcome.error_at(), Some("b"));
        assert_eq!(outcome.partial().unwrap().downcast_ref::<u32>(), Some(&2));
    }

    #[test]
    fn test_static_surface() {
        let a = atom("a", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_cost(
                CostSemiring::zero().with_llm_calls(1, 1),
                CostSemiring::zero().with_llm_calls(1, 2),
            )
            .with_confidence(ConfidenceEstimate::new(0.5, "a"));
        let b = atom("b", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_cost(
                CostSemiring::zero().with_tokens(10, 10),
                CostSemiring::zero().with_tokens(10, 50),
            )
            .with_confidence(ConfidenceEstimate::new(0.5, "b"));
        let pipeline = seq(a, b);

        assert_eq!(pipeline.max_cost().llm_calls.max(), 2);
        assert_eq!(pipeline.max_cost().tokens.max(), 50);
        assert_eq!(pipeline.min_cost().tokens.min(), 10);
        assert_eq!(
            pipeline.possible_paths(),
            vec![vec!["a".to_string(), "b".to_string()]]
        );
        assert_eq!(pipeline.dependency_set_lower().len(), 2);
        let confidence = pipeline.estimated_confidence().unwrap();
        assert!((confidence.value() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_requires_both_estimates() {
        let a = atom("a", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_confidence(ConfidenceEstimate::new(0.9, "a"));
        let pipeline = seq(a, inc("b"));
        assert!(pipeline.estimated_confidence().is_none());
    }

    #[test]
    fn test_custom_aggregator() {
        let a = atom("a", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_confidence(ConfidenceEstimate::new(0.9, "a"));
        let b = atom("b", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_confidence(ConfidenceEstimate::new(0.4, "b"));
        let pipeline = seq_with_aggregator(a, b, Arc::new(MinAggregator));
        let confidence = pipeline.estimated_confidence().unwrap();
        assert!((confidence.value() - 0.4).abs() < 1e-9);
        assert_eq!(confidence.basis(), "min");
    }
}

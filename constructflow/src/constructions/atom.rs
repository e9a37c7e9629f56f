//! Leaf constructions wrapping a single executor.

use super::{Construction, SelectiveConstruction};
use crate::context::{caller_context, ExecutionContext};
use crate::core::{ConfidenceEstimate, ConstructionOutcome, CostSemiring};
use crate::diagnostics::WithDiagnostics;
use crate::errors::ConstructionError;
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// Static metadata of a leaf construction.
#[derive(Debug, Clone)]
pub struct LeafMeta {
    id: String,
    name: Option<String>,
    min_cost: CostSemiring,
    max_cost: CostSemiring,
    confidence: Option<ConfidenceEstimate>,
}

impl LeafMeta {
    /// Creates metadata with zero cost and no confidence.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            min_cost: CostSemiring::zero(),
            max_cost: CostSemiring::zero(),
            confidence: None,
        }
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Sets the cost estimate. The network flag of `best` is widened to
    /// `worst` so that `min_cost` never claims more than `max_cost`.
    pub fn set_cost(&mut self, best: CostSemiring, worst: CostSemiring) {
        self.min_cost = best.alt_min(&worst);
        self.max_cost = best.alt_max(&worst);
    }

    /// Sets the static confidence estimate.
    pub fn set_confidence(&mut self, confidence: ConfidenceEstimate) {
        self.confidence = Some(confidence);
    }
}

/// Leaves whose static metadata can be adjusted after construction.
pub trait LeafConstruction {
    /// Mutable access to the leaf's metadata.
    fn meta_mut(&mut self) -> &mut LeafMeta;
}

macro_rules! leaf_selective {
    ($ty:ident < $($p:ident),+ >) => {
        impl<$($p),+> SelectiveConstruction for $ty<$($p),+>
        where
            F: Send + Sync,
        {
            fn id(&self) -> &str {
                &self.meta.id
            }

            fn name(&self) -> &str {
                self.meta.name.as_deref().unwrap_or(&self.meta.id)
            }

            fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
                self.meta.confidence.clone()
            }

            fn min_cost(&self) -> CostSemiring {
                self.meta.min_cost
            }

            fn max_cost(&self) -> CostSemiring {
                self.meta.max_cost
            }
        }

        impl<$($p),+> LeafConstruction for $ty<$($p),+> {
            fn meta_mut(&mut self) -> &mut LeafMeta {
                &mut self.meta
            }
        }
    };
}

/// A leaf whose executor returns a bare value or an error.
pub struct Atom<F, I, O> {
    meta: LeafMeta,
    executor: F,
    _types: PhantomData<fn(I) -> O>,
}

leaf_selective!(Atom<F, I, O>);

impl<F, I, O> std::fmt::Debug for Atom<F, I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom").field("meta", &self.meta).finish()
    }
}

#[async_trait]
impl<F, Fut, I, O> Construction<I, O, ConstructionError> for Atom<F, I, O>
where
    F: Fn(I, Option<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn execute(
        &self,
        input: I,
        ctx: Option<&ExecutionContext>,
    ) -> ConstructionOutcome<O, ConstructionError> {
        let id = self.meta.id.as_str();
        let ctx = caller_context(ctx).cloned();

        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.executor)(input, ctx))) {
            Ok(future) => future,
            Err(payload) => {
                warn!(construction_id = %id, "Executor panicked");
                return ConstructionOutcome::failure_at(
                    ConstructionError::from_panic(id, payload.as_ref()),
                    id,
                );
            }
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => ConstructionOutcome::success(value),
            Ok(Err(error)) => {
                let error = ConstructionError::from_executor_error(id, error);
                debug!(
                    construction_id = %id,
                    kind = %error.kind(),
                    error = %error,
                    "Executor failed"
                );
                ConstructionOutcome::failure_at(error, id)
            }
            Err(payload) => {
                warn!(construction_id = %id, "Executor panicked");
                ConstructionOutcome::failure_at(ConstructionError::from_panic(id, payload.as_ref()), id)
            }
        }
    }
}

/// A leaf whose executor returns a full outcome, passed through unchanged.
pub struct AtomOutcome<F, I, O, E> {
    meta: LeafMeta,
    executor: F,
    _types: PhantomData<fn(I) -> (O, E)>,
}

leaf_selective!(AtomOutcome<F, I, O, E>);

impl<F, I, O, E> std::fmt::Debug for AtomOutcome<F, I, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomOutcome").field("meta", &self.meta).finish()
    }
}

#[async_trait]
impl<F, Fut, I, O, E> Construction<I, O, E> for AtomOutcome<F, I, O, E>
where
    F: Fn(I, Option<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = ConstructionOutcome<O, E>> + Send,
    I: Send + 'static,
    O: Send + 'static,
    E: From<ConstructionError> + Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let id = self.meta.id.as_str();
        let ctx = caller_context(ctx).cloned();

        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.executor)(input, ctx))) {
            Ok(future) => future,
            Err(payload) => {
                warn!(construction_id = %id, "Executor panicked");
                return ConstructionOutcome::failure_at(
                    ConstructionError::from_panic(id, payload.as_ref()).into(),
                    id,
                );
            }
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                warn!(construction_id = %id, "Executor panicked");
                ConstructionOutcome::failure_at(
                    ConstructionError::from_panic(id, payload.as_ref()).into(),
                    id,
                )
            }
        }
    }
}

/// Returns its input unchanged.
pub struct Identity<T> {
    _type: PhantomData<fn(T) -> T>,
}

impl<T> std::fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Identity")
    }
}

impl<T> SelectiveConstruction for Identity<T> {
    fn id(&self) -> &str {
        "identity"
    }
}

#[async_trait]
impl<T, E> Construction<T, T, E> for Identity<T>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: T, _ctx: Option<&ExecutionContext>) -> ConstructionOutcome<T, E> {
        ConstructionOutcome::success(input)
    }
}

/// Creates a leaf from an executor returning `anyhow::Result<O>`.
///
/// Executor errors that are [`ConstructionError`]s are kept; any other
/// error or panic becomes a generic, non-retriable construction error.
/// Failures are attributed to `id`.
pub fn atom<F, Fut, I, O>(id: impl Into<String>, executor: F) -> WithDiagnostics<Atom<F, I, O>>
where
    F: Fn(I, Option<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<O>> + Send,
{
    WithDiagnostics::new(Atom {
        meta: LeafMeta::new(id),
        executor,
        _types: PhantomData,
    })
}

/// Creates a leaf from an executor returning a full outcome.
pub fn atom_outcome<F, Fut, I, O, E>(
    id: impl Into<String>,
    executor: F,
) -> WithDiagnostics<AtomOutcome<F, I, O, E>>
where
    F: Fn(I, Option<ExecutionContext>) -> Fut + Send + Sync,
    Fut: Future<Output = ConstructionOutcome<O, E>> + Send,
{
    WithDiagnostics::new(AtomOutcome {
        meta: LeafMeta::new(id),
        executor,
        _types: PhantomData,
    })
}

/// The identity construction.
#[must_use]
pub fn identity<T>() -> WithDiagnostics<Identity<T>> {
    WithDiagnostics::new(Identity { _type: PhantomData })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_atom_success() {
        let double = atom("double", |x: u32, _ctx| async move { anyhow::Ok(x * 2) });
        let outcome = double.execute(21, None).await;
        assert_eq!(outcome.into_value(), Some(42));
    }

    #[tokio::test]
    async fn test_atom_normalizes_plain_errors() {
        let broken = atom("broken", |_: u32, _ctx| async move {
            Err::<u32, _>(anyhow::anyhow!("no route"))
        });
        let outcome = broken.execute(1, None).await;

        let error = outcome.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::ConstructionError);
        assert_eq!(error.construction_id(), "broken");
        assert_eq!(error.message(), "no route");
        assert_eq!(outcome.error_at(), Some("broken"));
    }

    #[tokio::test]
    async fn test_atom_keeps_construction_errors() {
        let slow = atom("slow", |_: u32, _ctx| async move {
            Err::<u32, anyhow::Error>(ConstructionError::timeout("provider", 100).into())
        });
        let outcome = slow.execute(1, None).await;
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::Timeout);
        assert_eq!(outcome.error().unwrap().construction_id(), "provider");
    }

    #[tokio::test]
    async fn test_atom_catches_panics() {
        let sync_panic = atom("sync", |x: u32, _ctx| -> futures::future::Ready<anyhow::Result<u32>> {
            if x > 0 {
                panic!("sync boom");
            }
            futures::future::ready(Ok(x))
        });
        let outcome = sync_panic.execute(1, None).await;
        assert!(outcome.error().unwrap().message().contains("sync boom"));

        let async_panic = atom("async", |x: u32, _ctx| async move {
            if x > 0 {
                panic!("async boom");
            }
            anyhow::Ok(x)
        });
        let outcome = async_panic.execute(1, None).await;
        assert!(outcome.error().unwrap().message().contains("async boom"));
        assert_eq!(outcome.error_at(), Some("async"));
    }

    #[tokio::test]
    async fn test_atom_outcome_passes_through() {
        let partial = atom_outcome("partial", |x: u32, _ctx| async move {
            ConstructionOutcome::<u32, ConstructionError>::failure_at(
                ConstructionError::new("deep", "half done"),
                "deep",
            )
            .with_partial(crate::core::Partial::new(x))
        });
        let outcome = partial.execute(5, None).await;
        assert_eq!(outcome.error_at(), Some("deep"));
        assert_eq!(outcome.partial().unwrap().downcast_ref::<u32>(), Some(&5));
    }

    #[tokio::test]
    async fn test_executor_receives_context() {
        let reader = atom("reader", |_: (), ctx: Option<ExecutionContext>| async move {
            let ctx = ctx.ok_or_else(|| anyhow::anyhow!("no context"))?;
            let model = ctx
                .dependency::<String>("model")
                .ok_or_else(|| anyhow::anyhow!("no model"))?;
            anyhow::Ok(model.as_str().to_string())
        });

        let ctx = ExecutionContext::new().with_dependency("model", "m1".to_string());
        let outcome = reader.execute((), Some(&ctx)).await;
        assert_eq!(outcome.into_value().as_deref(), Some("m1"));

        let missing = reader.execute((), None).await;
        assert_eq!(missing.error().unwrap().message(), "no context");
    }

    #[tokio::test]
    async fn test_leaf_metadata() {
        let leaf = atom("gen", |x: u32, _ctx| async move { anyhow::Ok(x) })
            .with_name("Generate")
            .with_cost(
                CostSemiring::zero().with_llm_calls(1, 1),
                CostSemiring::zero().with_llm_calls(1, 2),
            )
            .with_confidence(ConfidenceEstimate::new(0.8, "eval"));

        assert_eq!(leaf.id(), "gen");
        assert_eq!(leaf.name(), "Generate");
        assert_eq!(leaf.max_cost().llm_calls.max(), 2);
        assert_eq!(leaf.estimated_confidence().unwrap().value(), 0.8);
        assert_eq!(leaf.possible_paths(), vec![vec!["gen".to_string()]]);

        let shared = Arc::new(leaf);
        assert_eq!(shared.id(), "gen");
    }

    #[tokio::test]
    async fn test_identity() {
        let id = identity::<String>();
        let outcome: ConstructionOutcome<String, ConstructionError> =
            id.execute("same".to_string(), None).await;
        assert_eq!(outcome.into_value().as_deref(), Some("same"));
    }
}

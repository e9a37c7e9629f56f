//! Scoped dependency injection.

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::{caller_context, Dependencies, ExecutionContext};
use crate::core::ConstructionOutcome;
use crate::diagnostics::WithDiagnostics;
use crate::errors::ConstructionError;
use async_trait::async_trait;

/// Runs the wrapped construction with extra dependencies merged into a
/// copy of the caller's context.
pub struct Provide<C> {
    id: String,
    inner: C,
    dependencies: Dependencies,
}

impl<C> std::fmt::Debug for Provide<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provide")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for Provide<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    delegate_bounds!(inner);
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for Provide<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: From<ConstructionError> + Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let Some(ctx) = caller_context(ctx) else {
            return ConstructionOutcome::failure_at(
                ConstructionError::new(self.id.as_str(), "execution context is required").into(),
                self.id.as_str(),
            );
        };

        let scoped = ctx.provide(&self.dependencies);
        self.inner.execute(input, Some(&scoped)).await
    }
}

/// Merges `dependencies` into the context seen by `inner` and its
/// descendants. Siblings outside the subtree never observe the merge.
pub fn provide<I, O, E, C>(inner: C, dependencies: Dependencies) -> WithDiagnostics<Provide<C>>
where
    C: Construction<I, O, E>,
{
    WithDiagnostics::new(Provide {
        id: format!("provide({})", inner.id()),
        inner,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::seq;
    use crate::constructions::{atom, ConstructionExt};
    use crate::diagnostics::DebugOptions;

    fn read_model(id: &'static str) -> impl Construction<Vec<String>, Vec<String>> {
        atom(id, |mut seen: Vec<String>, ctx: Option<ExecutionContext>| async move {
            let model = ctx
                .and_then(|c| c.dependency::<String>("model"))
                .map_or_else(|| "none".to_string(), |m| m.as_str().to_string());
            seen.push(model);
            anyhow::Ok(seen)
        })
    }

    #[tokio::test]
    async fn test_provide_scopes_dependencies() {
        let composed = seq(
            provide(
                read_model("inside"),
                Dependencies::new().with("model", "large".to_string()),
            ),
            read_model("outside"),
        );

        let ctx = ExecutionContext::new().with_dependency("model", "small".to_string());
        let outcome = composed.execute(Vec::new(), Some(&ctx)).await;
        assert_eq!(
            outcome.into_value().unwrap(),
            vec!["large".to_string(), "small".to_string()]
        );
    }

    #[tokio::test]
    async fn test_provide_requires_context() {
        let composed = provide(read_model("inner"), Dependencies::new());
        let outcome = composed.execute(Vec::new(), None).await;
        let error = outcome.error().unwrap();
        assert_eq!(error.message(), "execution context is required");
        assert_eq!(outcome.error_at(), Some("provide(inner)"));

        let debugged = provide(read_model("inner"), Dependencies::new()).debug(DebugOptions::default());
        assert!(debugged.execute(Vec::new(), None).await.is_failure());
    }
}

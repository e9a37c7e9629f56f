//! Input and output adapters.

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::ConstructionOutcome;
use crate::diagnostics::WithDiagnostics;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Adapts the input with `pre` and the output with `post`.
pub struct Dimap<C, F, G, A, B> {
    id: String,
    inner: C,
    pre: F,
    post: G,
    _types: PhantomData<fn(A) -> B>,
}

impl<C, F, G, A, B> std::fmt::Debug for Dimap<C, F, G, A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dimap").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<C, F, G, A, B> SelectiveConstruction for Dimap<C, F, G, A, B>
where
    C: SelectiveConstruction,
    F: Send + Sync,
    G: Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    delegate_bounds!(inner);
}

#[async_trait]
impl<I, A, B, O, E, C, F, G> Construction<I, O, E> for Dimap<C, F, G, A, B>
where
    C: Construction<A, B, E>,
    F: Fn(I) -> A + Send + Sync,
    G: Fn(B) -> O + Send + Sync,
    I: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        self.inner
            .execute((self.pre)(input), ctx)
            .await
            .map(&self.post)
    }
}

/// Adapts both input and output. Failures pass through and skip `post`.
pub fn dimap<I, A, B, O, E, C, F, G>(inner: C, pre: F, post: G) -> WithDiagnostics<Dimap<C, F, G, A, B>>
where
    C: Construction<A, B, E>,
    F: Fn(I) -> A + Send + Sync,
    G: Fn(B) -> O + Send + Sync,
{
    WithDiagnostics::new(Dimap {
        id: format!("dimap({})", inner.id()),
        inner,
        pre,
        post,
        _types: PhantomData,
    })
}

/// Adapts only the input.
pub fn contramap<I, A, B, E, C, F>(inner: C, pre: F) -> WithDiagnostics<Dimap<C, F, fn(B) -> B, A, B>>
where
    C: Construction<A, B, E>,
    F: Fn(I) -> A + Send + Sync,
{
    WithDiagnostics::new(Dimap {
        id: format!("contramap({})", inner.id()),
        inner,
        pre,
        post: std::convert::identity::<B> as fn(B) -> B,
        _types: PhantomData,
    })
}

/// Adapts only the output.
pub fn map<A, B, O, E, C, G>(inner: C, post: G) -> WithDiagnostics<Dimap<C, fn(A) -> A, G, A, B>>
where
    C: Construction<A, B, E>,
    G: Fn(B) -> O + Send + Sync,
{
    WithDiagnostics::new(Dimap {
        id: format!("map({})", inner.id()),
        inner,
        pre: std::convert::identity::<A> as fn(A) -> A,
        post,
        _types: PhantomData,
    })
}

/// Post-processes a successful output asynchronously.
pub struct MapAsync<C, G, B> {
    id: String,
    inner: C,
    post: G,
    _types: PhantomData<fn() -> B>,
}

impl<C, G, B> std::fmt::Debug for MapAsync<C, G, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapAsync").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<C, G, B> SelectiveConstruction for MapAsync<C, G, B>
where
    C: SelectiveConstruction,
    G: Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    delegate_bounds!(inner);
}

#[async_trait]
impl<I, B, O, E, C, G, Fut> Construction<I, O, E> for MapAsync<C, G, B>
where
    C: Construction<I, B, E>,
    G: Fn(B) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send,
    I: Send + 'static,
    B: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        match self.inner.execute(input, ctx).await {
            ConstructionOutcome::Success { value } => {
                ConstructionOutcome::success((self.post)(value).await)
            }
            ConstructionOutcome::Failure {
                error,
                partial,
                error_at,
            } => ConstructionOutcome::Failure {
                error,
                partial,
                error_at,
            },
        }
    }
}

/// Asynchronous output adapter.
pub fn map_async<I, B, O, E, C, G, Fut>(inner: C, post: G) -> WithDiagnostics<MapAsync<C, G, B>>
where
    C: Construction<I, B, E>,
    G: Fn(B) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send,
{
    WithDiagnostics::new(MapAsync {
        id: format!("map_async({})", inner.id()),
        inner,
        post,
        _types: PhantomData,
    })
}

/// Transforms the error type, keeping partial and origin.
pub struct MapError<C, H, E0> {
    id: String,
    inner: C,
    transform: H,
    _error: PhantomData<fn(E0)>,
}

impl<C, H, E0> std::fmt::Debug for MapError<C, H, E0> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapError").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<C, H, E0> SelectiveConstruction for MapError<C, H, E0>
where
    C: SelectiveConstruction,
    H: Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    delegate_bounds!(inner);
}

#[async_trait]
impl<I, O, E0, E, C, H> Construction<I, O, E> for MapError<C, H, E0>
where
    C: Construction<I, O, E0>,
    H: Fn(E0) -> E + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
    E0: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        self.inner.execute(input, ctx).await.map_err(&self.transform)
    }
}

/// Changes the error type of a construction.
pub fn map_error<I, O, E0, E, C, H>(inner: C, transform: H) -> WithDiagnostics<MapError<C, H, E0>>
where
    C: Construction<I, O, E0>,
    H: Fn(E0) -> E + Send + Sync,
{
    WithDiagnostics::new(MapError {
        id: format!("map_error({})", inner.id()),
        inner,
        transform,
        _error: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructions::atom;
    use crate::errors::{ConstructionError, ErrorKind};

    fn length() -> impl Construction<String, usize> {
        atom("length", |s: String, _ctx| async move { anyhow::Ok(s.len()) })
    }

    fn refuse() -> impl Construction<String, usize> {
        atom("refuse", |_: String, _ctx| async move {
            Err::<usize, anyhow::Error>(ConstructionError::invalid_input("refuse", "empty").into())
        })
    }

    #[derive(Debug, thiserror::Error)]
    #[error("app error: {0}")]
    struct AppError(String);

    #[tokio::test]
    async fn test_dimap_adapts_both_ends() {
        let adapted = dimap(length(), |n: u32| "x".repeat(n as usize), |len: usize| len * 10);
        assert_eq!(adapted.execute(3, None).await.into_value(), Some(30));
        assert_eq!(adapted.id(), "dimap(length)");
        assert_eq!(adapted.possible_paths(), vec![vec!["length".to_string()]]);
    }

    #[tokio::test]
    async fn test_map_and_contramap() {
        let mapped = map(length(), |len: usize| len % 2 == 0);
        assert_eq!(mapped.execute("ab".to_string(), None).await.into_value(), Some(true));

        let contra = contramap(length(), |words: Vec<&'static str>| words.join(" "));
        assert_eq!(contra.execute(vec!["a", "b"], None).await.into_value(), Some(3));
    }

    #[tokio::test]
    async fn test_map_skips_post_on_failure() {
        let mapped = map(refuse(), |_: usize| -> bool { unreachable!("post must not run") });
        let outcome = mapped.execute(String::new(), None).await;
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::InputError);
        assert_eq!(outcome.error_at(), Some("refuse"));
    }

    #[tokio::test]
    async fn test_map_async() {
        let doubled = map_async(length(), |len: usize| async move {
            tokio::task::yield_now().await;
            len * 2
        });
        assert_eq!(doubled.execute("abc".to_string(), None).await.into_value(), Some(6));
    }

    #[tokio::test]
    async fn test_map_error_changes_type() {
        let mapped = map_error(refuse(), |e: ConstructionError| AppError(e.message().to_string()));
        let outcome: ConstructionOutcome<usize, AppError> =
            mapped.execute(String::new(), None).await;
        assert_eq!(outcome.error().unwrap().0, "empty");
        assert_eq!(outcome.error_at(), Some("refuse"));
    }
}

//! Mock constructions for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConfidenceEstimate, ConstructionOutcome, CostSemiring, ResourceUsage};
use crate::errors::ConstructionError;

/// A construction that replays a scripted list of outcomes, one per call.
///
/// Once the script is exhausted every call fails.
pub struct MockConstruction<I, O, E = ConstructionError> {
    id: String,
    outcomes: Mutex<VecDeque<ConstructionOutcome<O, E>>>,
    calls: AtomicUsize,
    min_cost: CostSemiring,
    max_cost: CostSemiring,
    _input: PhantomData<fn(I)>,
}

impl<I, O, E> MockConstruction<I, O, E> {
    /// Creates a mock with an empty script.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            min_cost: CostSemiring::zero(),
            max_cost: CostSemiring::zero(),
            _input: PhantomData,
        }
    }

    /// Sets the outcomes returned by successive calls.
    #[must_use]
    pub fn with_outcomes(self, outcomes: Vec<ConstructionOutcome<O, E>>) -> Self {
        *self.outcomes.lock() = outcomes.into();
        self
    }

    /// Sets the reported cost bounds.
    #[must_use]
    pub const fn with_cost(mut self, best: CostSemiring, worst: CostSemiring) -> Self {
        self.min_cost = best;
        self.max_cost = worst;
        self
    }

    /// Appends an outcome to the script.
    pub fn push_outcome(&self, outcome: ConstructionOutcome<O, E>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Number of times the mock was executed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of scripted outcomes not yet returned.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.outcomes.lock().len()
    }
}

impl<I, O: Send, E: Send> SelectiveConstruction for MockConstruction<I, O, E> {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_cost(&self) -> CostSemiring {
        self.min_cost
    }

    fn max_cost(&self) -> CostSemiring {
        self.max_cost
    }
}

#[async_trait]
impl<I, O, E> Construction<I, O, E> for MockConstruction<I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: From<ConstructionError> + Send + 'static,
{
    async fn execute(&self, _input: I, _ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().pop_front();
        next.unwrap_or_else(|| {
            ConstructionOutcome::failure_at(
                ConstructionError::new(&self.id, "mock outcomes exhausted").into(),
                &self.id,
            )
        })
    }
}

/// Wraps a construction and counts its executions.
pub struct CountingConstruction<C> {
    inner: C,
    calls: AtomicUsize,
}

impl<C> CountingConstruction<C> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the wrapped construction was executed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for CountingConstruction<C> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
        self.inner.estimated_confidence()
    }

    fn min_cost(&self) -> CostSemiring {
        self.inner.min_cost()
    }

    fn max_cost(&self) -> CostSemiring {
        self.inner.max_cost()
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        self.inner.possible_paths()
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        self.inner.dependency_set_upper()
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.inner.dependency_set_lower()
    }
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for CountingConstruction<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(input, ctx).await
    }
}

/// A construction that always fails with the same error.
pub struct FailingConstruction<O> {
    id: String,
    error: ConstructionError,
    _output: PhantomData<fn() -> O>,
}

impl<O> FailingConstruction<O> {
    /// Fails with `error`.
    #[must_use]
    pub fn new(id: impl Into<String>, error: ConstructionError) -> Self {
        Self {
            id: id.into(),
            error,
            _output: PhantomData,
        }
    }

    /// Fails with a generic error carrying `message`.
    #[must_use]
    pub fn with_message(id: impl Into<String>, message: impl Into<String>) -> Self {
        let id = id.into();
        let error = ConstructionError::new(id.clone(), message);
        Self::new(id, error)
    }
}

impl<O> SelectiveConstruction for FailingConstruction<O> {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl<I, O> Construction<I, O> for FailingConstruction<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn execute(&self, _input: I, _ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, ConstructionError> {
        ConstructionOutcome::failure_at(self.error.clone(), &self.id)
    }
}

/// Echoes its input after a fixed delay.
#[derive(Debug)]
pub struct SlowConstruction {
    id: String,
    delay: Duration,
}

impl SlowConstruction {
    /// Creates a slow construction.
    #[must_use]
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
        }
    }

    /// Creates a slow construction with the delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(id: impl Into<String>, ms: u64) -> Self {
        Self::new(id, Duration::from_millis(ms))
    }
}

impl SelectiveConstruction for SlowConstruction {
    fn id(&self) -> &str {
        &self.id
    }

    fn max_cost(&self) -> CostSemiring {
        let ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX);
        CostSemiring::zero().with_latency_ms(ms, ms)
    }

    fn min_cost(&self) -> CostSemiring {
        self.max_cost()
    }
}

#[async_trait]
impl<T: Send + 'static> Construction<T, T> for SlowConstruction {
    async fn execute(&self, input: T, _ctx: Option<&ExecutionContext>) -> ConstructionOutcome<T, ConstructionError> {
        tokio::time::sleep(self.delay).await;
        ConstructionOutcome::success(input)
    }
}

/// Wraps a construction and charges a fixed [`ResourceUsage`] to a shared
/// meter on every execution.
pub struct MeteredConstruction<C> {
    inner: C,
    usage: ResourceUsage,
    meter: Arc<Mutex<ResourceUsage>>,
}

impl<C> MeteredConstruction<C> {
    /// Wraps `inner`, charging `usage` to `meter` per call.
    #[must_use]
    pub const fn new(inner: C, usage: ResourceUsage, meter: Arc<Mutex<ResourceUsage>>) -> Self {
        Self { inner, usage, meter }
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for MeteredConstruction<C> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn min_cost(&self) -> CostSemiring {
        self.inner.min_cost()
    }

    fn max_cost(&self) -> CostSemiring {
        self.inner.max_cost()
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        self.inner.possible_paths()
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        self.inner.dependency_set_upper()
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.inner.dependency_set_lower()
    }
}

#[async_trait]
impl<I, O, E, C> Construction<I, O, E> for MeteredConstruction<C>
where
    C: Construction<I, O, E>,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        self.meter.lock().record(&self.usage);
        self.inner.execute(input, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn test_mock_replays_then_fails() {
        let mock = MockConstruction::<(), u8>::new("m").with_outcomes(vec![ConstructionOutcome::success(1)]);
        assert_eq!(mock.remaining(), 1);
        assert_eq!(mock.execute((), None).await.into_value(), Some(1));

        let outcome = mock.execute((), None).await;
        assert_eq!(outcome.error_at(), Some("m"));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_construction() {
        let failing = FailingConstruction::<u8>::new("f", ConstructionError::llm("f", "rate limited"));
        let outcome: ConstructionOutcome<u8, ConstructionError> = failing.execute((), None).await;
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::LlmError);
        assert_eq!(outcome.error_at(), Some("f"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_construction_waits() {
        let slow = SlowConstruction::with_delay_ms("s", 50);
        let started = tokio::time::Instant::now();
        assert_eq!(slow.execute(3_u8, None).await.into_value(), Some(3));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(slow.max_cost().latency_ms.max(), 50);
    }

    #[tokio::test]
    async fn test_metered_charges_each_call() {
        let meter = Arc::new(Mutex::new(ResourceUsage::default()));
        let usage = ResourceUsage {
            llm_calls: 1,
            tokens: 10,
            ..ResourceUsage::default()
        };
        let metered = MeteredConstruction::new(SlowConstruction::with_delay_ms("s", 0), usage, Arc::clone(&meter));
        let _ = metered.execute(1_u8, None).await;
        let _ = metered.execute(2_u8, None).await;
        assert_eq!(meter.lock().tokens, 20);
        assert_eq!(meter.lock().llm_calls, 2);
    }
}

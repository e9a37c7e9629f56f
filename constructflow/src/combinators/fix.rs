//! Bounded fixpoint iteration with monotonicity and cycle checks.

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConstructionOutcome, CostSemiring, HasConfidence};
use crate::diagnostics::WithDiagnostics;
use crate::errors::{ConfigError, ConstructionError};
use crate::evidence::EvidenceEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper limit on the number of paths reported by [`Fix::possible_paths`].
/// Enumeration stops once it is reached, so the list is complete only for
/// bodies and iteration limits that stay below it.
pub const MAX_FIX_PATHS: usize = 1024;

type Measure<S> = Arc<dyn Fn(&S) -> f64 + Send + Sync>;
type StateHash<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Progress measure of a fixpoint state.
pub struct FixMetric<S> {
    measure: Measure<S>,
    capacity: f64,
    state_hash: Option<StateHash<S>>,
}

impl<S> Clone for FixMetric<S> {
    fn clone(&self) -> Self {
        Self {
            measure: Arc::clone(&self.measure),
            capacity: self.capacity,
            state_hash: self.state_hash.clone(),
        }
    }
}

impl<S> std::fmt::Debug for FixMetric<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixMetric")
            .field("capacity", &self.capacity)
            .field("custom_state_hash", &self.state_hash.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> FixMetric<S> {
    /// Creates a metric. A state whose measure reaches `capacity` is
    /// considered converged.
    #[must_use]
    pub fn new(measure: impl Fn(&S) -> f64 + Send + Sync + 'static, capacity: f64) -> Self {
        Self {
            measure: Arc::new(measure),
            capacity,
            state_hash: None,
        }
    }

    /// Overrides the state hash used for cycle detection.
    #[must_use]
    pub fn with_state_hash(mut self, hash: impl Fn(&S) -> String + Send + Sync + 'static) -> Self {
        self.state_hash = Some(Arc::new(hash));
        self
    }

    /// Measures a state.
    #[must_use]
    pub fn measure(&self, state: &S) -> f64 {
        (self.measure)(state)
    }

    /// The convergence threshold.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Iteration limits for [`fix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Maximum number of body executions.
    pub max_iter: usize,
    /// Monotone regressions tolerated before stopping. Zero selects strict
    /// mode, where a revisited state is a hard failure.
    pub max_violations: usize,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            max_iter: 10,
            max_violations: 0,
        }
    }
}

impl FixConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration budget.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the tolerated number of monotone violations.
    #[must_use]
    pub const fn with_max_violations(mut self, max_violations: usize) -> Self {
        self.max_violations = max_violations;
        self
    }

    /// Returns true in strict mode.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.max_violations == 0
    }

    /// Checks the config for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `max_iter` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(ConfigError::invalid("max_iter", "must be at least 1"));
        }
        Ok(())
    }
}

/// Why a fixpoint stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The initial state already satisfied the stop condition.
    StopCondition,
    /// The stop condition held, or the measure reached capacity.
    Converged,
    /// More monotone regressions than tolerated.
    MonotoneViolationLimit,
    /// A previous state was revisited in lenient mode.
    Cycle,
    /// The iteration budget ran out.
    BudgetExhausted,
}

impl TerminationReason {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopCondition => "stop_condition",
            Self::Converged => "converged",
            Self::MonotoneViolationLimit => "monotone_violation_limit",
            Self::Cycle => "cycle",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fixpoint run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixpointMetadata {
    /// Number of body executions.
    pub iterations: usize,
    /// Measure of the final state.
    pub final_measure: f64,
    /// Number of monotone regressions observed.
    pub monotone_violations: usize,
    /// Whether a previous state was revisited.
    pub cycle_detected: bool,
    /// Why iteration stopped.
    pub termination_reason: TerminationReason,
}

/// The final state of a fixpoint run with its metadata. Serializes flat,
/// with state fields and metadata side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixpoint<S> {
    /// The final state.
    #[serde(flatten)]
    pub state: S,
    /// How the run ended.
    #[serde(flatten)]
    pub metadata: FixpointMetadata,
}

/// Repeats `body` until a termination condition holds.
pub struct Fix<Bd, P, S> {
    id: String,
    body: Bd,
    stop: P,
    metric: FixMetric<S>,
    config: FixConfig,
}

impl<Bd, P, S> std::fmt::Debug for Fix<Bd, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fix")
            .field("id", &self.id)
            .field("metric", &self.metric)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<Bd, P, S> Fix<Bd, P, S>
where
    S: Serialize,
{
    fn state_hash(&self, state: &S) -> Result<String, ConstructionError> {
        if let Some(hash) = &self.metric.state_hash {
            return Ok(hash(state));
        }
        let bytes = serde_json::to_vec(state).map_err(|e| {
            ConstructionError::new(
                self.id.as_str(),
                format!("Failed to hash fixpoint state: {e}"),
            )
            .with_cause(e)
        })?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    async fn report_violation(
        &self,
        ctx: Option<&ExecutionContext>,
        iteration: usize,
        previous_measure: f64,
        next_measure: f64,
    ) {
        let Some(ctx) = ctx else {
            return;
        };
        let Some(ledger) = ctx.evidence_ledger() else {
            return;
        };
        let entry = EvidenceEntry::monotone_violation(
            &self.id,
            iteration,
            previous_measure,
            next_measure,
            ctx.session_id(),
        );
        if let Err(error) = ledger.append(entry).await {
            warn!(
                construction_id = %self.id,
                iteration,
                error = %error,
                "Failed to record monotone violation"
            );
        }
    }
}

impl<Bd, P, S> SelectiveConstruction for Fix<Bd, P, S>
where
    Bd: SelectiveConstruction,
    P: Send + Sync,
    S: Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn max_cost(&self) -> CostSemiring {
        self.body
            .max_cost()
            .scale(u64::try_from(self.config.max_iter).unwrap_or(u64::MAX))
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        let body = self.body.possible_paths();
        let mut seen = HashSet::from([Vec::new()]);
        let mut paths = vec![Vec::new()];
        let mut frontier: Vec<Vec<String>> = vec![Vec::new()];

        'expand: for _ in 0..self.config.max_iter {
            let mut next = Vec::new();
            for head in &frontier {
                for tail in &body {
                    if paths.len() >= MAX_FIX_PATHS {
                        break 'expand;
                    }
                    let mut path = head.clone();
                    path.extend(tail.iter().cloned());
                    if seen.insert(path.clone()) {
                        paths.push(path.clone());
                        next.push(path);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        paths
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        self.body.dependency_set_upper()
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

#[async_trait]
impl<Bd, P, S, E> Construction<S, Fixpoint<S>, E> for Fix<Bd, P, S>
where
    Bd: Construction<S, S, E>,
    P: Fn(&S) -> bool + Send + Sync,
    S: Clone + Serialize + HasConfidence + Send + Sync + 'static,
    E: From<ConstructionError> + Send + 'static,
{
    #[allow(clippy::cast_precision_loss)]
    async fn execute(
        &self,
        input: S,
        ctx: Option<&ExecutionContext>,
    ) -> ConstructionOutcome<Fixpoint<S>, E> {
        let id = self.id.as_str();
        let mut state = input;
        let mut seen = HashSet::new();
        match self.state_hash(&state) {
            Ok(hash) => seen.insert(hash),
            Err(error) => return ConstructionOutcome::failure_at(error.into(), id),
        };

        let mut iterations = 0;
        let mut violations = 0;
        let mut cycle_detected = false;

        let reason = loop {
            if (self.stop)(&state) {
                break if iterations == 0 {
                    TerminationReason::StopCondition
                } else {
                    TerminationReason::Converged
                };
            }
            let current_measure = self.metric.measure(&state);
            if current_measure >= self.metric.capacity() {
                break TerminationReason::Converged;
            }
            if iterations >= self.config.max_iter {
                break TerminationReason::BudgetExhausted;
            }

            let next = match self.body.execute(state.clone(), ctx).await {
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
            iterations += 1;

            let next_measure = self.metric.measure(&next);
            if next_measure < current_measure {
                violations += 1;
                debug!(
                    construction_id = %id,
                    iteration = iterations,
                    previous_measure = current_measure,
                    next_measure,
                    "Monotone violation"
                );
                self.report_violation(ctx, iterations, current_measure, next_measure)
                    .await;
                if violations > self.config.max_violations {
                    state = next;
                    break TerminationReason::MonotoneViolationLimit;
                }
            }

            let hash = match self.state_hash(&next) {
                Ok(hash) => hash,
                Err(error) => return ConstructionOutcome::failure_at(error.into(), id),
            };
            if seen.contains(&hash) {
                cycle_detected = true;
                if self.config.is_strict() {
                    warn!(construction_id = %id, iteration = iterations, "Fixpoint cycle in strict mode");
                    return ConstructionOutcome::failure_at(
                        ConstructionError::cycle_detected(id, iterations, hash).into(),
                        id,
                    );
                }
                state = next;
                break TerminationReason::Cycle;
            }
            seen.insert(hash);
            state = next;
        };

        if violations > 0 {
            if let Some(confidence) = state.confidence() {
                let factor =
                    (1.0 - violations as f64 / self.config.max_iter.max(1) as f64).clamp(0.0, 1.0);
                state.set_confidence((confidence * factor).clamp(0.0, 1.0));
            }
        }

        let metadata = FixpointMetadata {
            iterations,
            final_measure: self.metric.measure(&state),
            monotone_violations: violations,
            cycle_detected,
            termination_reason: reason,
        };
        info!(
            construction_id = %id,
            iterations,
            monotone_violations = violations,
            cycle_detected,
            termination_reason = %reason,
            "Fixpoint terminated"
        );
        ConstructionOutcome::success(Fixpoint { state, metadata })
    }
}

/// Iterates `body` from the input state until `stop` holds, the measure
/// reaches capacity, the budget runs out, too many monotone regressions
/// occur, or a state repeats.
///
/// Only a repeated state in strict mode fails; every other termination is
/// a success annotated with [`FixpointMetadata`].
pub fn fix<S, E, Bd, P>(
    body: Bd,
    stop: P,
    metric: FixMetric<S>,
    config: FixConfig,
) -> WithDiagnostics<Fix<Bd, P, S>>
where
    Bd: Construction<S, S, E>,
    P: Fn(&S) -> bool + Send + Sync,
{
    WithDiagnostics::new(Fix {
        id: format!("fix({})", body.id()),
        body,
        stop,
        metric,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructions::atom;
    use crate::context::ExecutionContext;
    use crate::errors::ErrorKind;
    use crate::evidence::{CollectingLedger, EvidenceLedger, LedgerError, MockEvidenceLedger};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    }

    impl HasConfidence for Counter {
        fn confidence(&self) -> Option<f64> {
            self.confidence
        }

        fn set_confidence(&mut self, confidence: f64) {
            self.confidence = Some(confidence);
        }
    }

    fn counter(count: i64) -> Counter {
        Counter {
            count,
            confidence: None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn by_count() -> FixMetric<Counter> {
        FixMetric::new(|c: &Counter| c.count as f64, 100.0)
    }

    fn step(delta: i64) -> impl Construction<Counter, Counter> {
        atom("step", move |mut c: Counter, _ctx| async move {
            c.count += delta;
            anyhow::Ok(c)
        })
    }

    #[tokio::test]
    async fn test_converges_on_stop_condition() {
        let looped = fix(step(1), |c: &Counter| c.count >= 3, by_count(), FixConfig::default());
        let result = looped.execute(counter(0), None).await.into_value().unwrap();

        assert_eq!(result.state.count, 3);
        assert_eq!(result.metadata.iterations, 3);
        assert_eq!(result.metadata.termination_reason, TerminationReason::Converged);
        assert_eq!(result.metadata.final_measure, 3.0);
        assert!(!result.metadata.cycle_detected);
    }

    #[tokio::test]
    async fn test_stop_condition_before_first_iteration() {
        let looped = fix(step(1), |_: &Counter| true, by_count(), FixConfig::default());
        let result = looped.execute(counter(7), None).await.into_value().unwrap();
        assert_eq!(result.metadata.iterations, 0);
        assert_eq!(result.metadata.termination_reason, TerminationReason::StopCondition);
    }

    #[tokio::test]
    async fn test_capacity_counts_as_converged() {
        let metric = FixMetric::new(|c: &Counter| c.count as f64, 2.0);
        let looped = fix(step(1), |_: &Counter| false, metric, FixConfig::default());
        let result = looped.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.state.count, 2);
        assert_eq!(result.metadata.termination_reason, TerminationReason::Converged);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let looped = fix(
            step(1),
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_iter(5),
        );
        let result = looped.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.metadata.iterations, 5);
        assert_eq!(result.metadata.termination_reason, TerminationReason::BudgetExhausted);
    }

    #[tokio::test]
    async fn test_final_state_satisfying_stop_is_converged() {
        let looped = fix(
            step(1),
            |c: &Counter| c.count >= 5,
            by_count(),
            FixConfig::new().with_max_iter(5),
        );
        let result = looped.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.metadata.iterations, 5);
        assert_eq!(result.metadata.termination_reason, TerminationReason::Converged);
    }

    #[tokio::test]
    async fn test_body_failure_short_circuits() {
        let failing = atom("explode", |_: Counter, _ctx| async move {
            Err::<Counter, anyhow::Error>(ConstructionError::llm("explode", "provider down").into())
        });
        let looped = fix(failing, |_: &Counter| false, by_count(), FixConfig::default());
        let outcome = looped.execute(counter(0), None).await;
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::LlmError);
        assert_eq!(outcome.error_at(), Some("explode"));
    }

    #[tokio::test]
    async fn test_strict_regression_stops_and_penalizes() {
        let mut ledger = MockEvidenceLedger::new();
        ledger
            .expect_append()
            .times(1)
            .withf(|entry| entry.payload.iteration == 1 && entry.payload.next_measure < 0.0)
            .returning(|_| Ok(()));
        let ledger: Arc<dyn EvidenceLedger> = Arc::new(ledger);
        let ctx = ExecutionContext::new().with_evidence_ledger(ledger);

        let looped = fix(step(-1), |_: &Counter| false, by_count(), FixConfig::default());
        let start = Counter {
            count: 0,
            confidence: Some(0.8),
        };
        let result = looped.execute(start, Some(&ctx)).await.into_value().unwrap();

        assert_eq!(result.state.count, -1);
        assert_eq!(result.metadata.monotone_violations, 1);
        assert_eq!(
            result.metadata.termination_reason,
            TerminationReason::MonotoneViolationLimit
        );
        let penalized = result.state.confidence.unwrap();
        assert!((penalized - 0.72).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_not_fatal() {
        let mut ledger = MockEvidenceLedger::new();
        ledger
            .expect_append()
            .returning(|_| Err(LedgerError::Unavailable("offline".to_string())));
        let ledger: Arc<dyn EvidenceLedger> = Arc::new(ledger);
        let ctx = ExecutionContext::new().with_evidence_ledger(ledger);

        let looped = fix(step(-1), |_: &Counter| false, by_count(), FixConfig::default());
        assert!(looped.execute(counter(0), Some(&ctx)).await.is_success());
    }

    #[tokio::test]
    async fn test_lenient_cycle_is_annotated_success() {
        let toggle = atom("toggle", |mut c: Counter, _ctx| async move {
            c.count = 1 - c.count;
            anyhow::Ok(c)
        });
        let collecting = Arc::new(CollectingLedger::new());
        let ctx = ExecutionContext::new()
            .with_session_id("s-1")
            .with_evidence_ledger(Arc::clone(&collecting) as Arc<dyn EvidenceLedger>);

        let looped = fix(
            toggle,
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_violations(3),
        );
        let result = looped.execute(counter(0), Some(&ctx)).await.into_value().unwrap();

        assert!(result.metadata.cycle_detected);
        assert_eq!(result.metadata.termination_reason, TerminationReason::Cycle);
        assert_eq!(result.metadata.iterations, 2);
        assert_eq!(result.metadata.monotone_violations, 1);

        let entries = collecting.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "s-1");
        assert_eq!(entries[0].payload.construction_id, "fix(toggle)");
    }

    #[tokio::test]
    async fn test_strict_cycle_fails() {
        let stuck = atom("stuck", |c: Counter, _ctx| async move { anyhow::Ok(c) });
        let looped = fix(stuck, |_: &Counter| false, by_count(), FixConfig::default());
        let outcome = looped.execute(counter(4), None).await;

        let error = outcome.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::CycleDetected);
        assert!(matches!(error, ConstructionError::CycleDetected { iteration: 1, .. }));
        assert_eq!(outcome.error_at(), Some("fix(stuck)"));
    }

    #[tokio::test]
    async fn test_custom_state_hash() {
        let metric = by_count().with_state_hash(|c: &Counter| (c.count % 2).to_string());
        let looped = fix(
            step(1),
            |_: &Counter| false,
            metric,
            FixConfig::new().with_max_violations(1),
        );
        let result = looped.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.metadata.termination_reason, TerminationReason::Cycle);
        assert_eq!(result.state.count, 2);
    }

    #[tokio::test]
    async fn test_result_serializes_flat() {
        let looped = fix(step(1), |c: &Counter| c.count >= 1, by_count(), FixConfig::default());
        let result = looped.execute(counter(0), None).await.into_value().unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["iterations"], 1);
        assert_eq!(json["termination_reason"], "converged");
    }

    #[test]
    fn test_static_surface() {
        let looped = fix(
            step(1),
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_iter(2),
        );
        assert_eq!(
            looped.possible_paths(),
            vec![
                Vec::<String>::new(),
                vec!["step".to_string()],
                vec!["step".to_string(), "step".to_string()],
            ]
        );
        assert!(looped.dependency_set_lower().is_empty());
        assert_eq!(looped.min_cost(), CostSemiring::zero());
    }

    #[test]
    fn test_path_enumeration_is_capped() {
        let bump = |id: &'static str| {
            atom(id, |mut c: Counter, _ctx| async move {
                c.count += 1;
                anyhow::Ok(c)
            })
        };
        let body = crate::combinators::fallback(bump("draft"), bump("repair"));
        assert_eq!(body.possible_paths().len(), 2);

        let looped = fix(
            body,
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_iter(40),
        );
        let paths = looped.possible_paths();
        assert_eq!(paths.len(), MAX_FIX_PATHS);
        assert!(paths[0].is_empty());
        assert_eq!(paths[1], vec!["draft".to_string()]);
    }

    #[test]
    fn test_single_path_body_stops_at_max_iter() {
        let looped = fix(
            step(1),
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_iter(usize::MAX),
        );
        assert_eq!(looped.possible_paths().len(), MAX_FIX_PATHS);
    }

    #[tokio::test]
    async fn test_zero_budget_still_honors_stop_condition() {
        let looped = fix(
            step(1),
            |_: &Counter| true,
            by_count(),
            FixConfig::new().with_max_iter(0),
        );
        let result = looped.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.metadata.iterations, 0);
        assert_eq!(result.metadata.termination_reason, TerminationReason::StopCondition);

        let idle = fix(
            step(1),
            |_: &Counter| false,
            by_count(),
            FixConfig::new().with_max_iter(0),
        );
        let result = idle.execute(counter(0), None).await.into_value().unwrap();
        assert_eq!(result.metadata.termination_reason, TerminationReason::BudgetExhausted);
        assert_eq!(result.state.count, 0);
    }
}

//! Bounded retry with exponential backoff.

use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConstructionOutcome, CostSemiring};
use crate::diagnostics::WithDiagnostics;
use crate::errors::{ConfigError, Retriable};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Jitter applied to backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Exact delays.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Configuration for [`with_retry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound of any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_factor: f64,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff factor.
    #[must_use]
    pub const fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks the config for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::invalid(
                "backoff_factor",
                "must be a finite number >= 1.0",
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::invalid(
                "base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Un-jittered delay after the `attempt`-th failure (1-based):
    /// `base * factor^(attempt - 1)`, capped at `max_delay_ms`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);
        if !raw.is_finite() || raw >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            raw.max(0.0) as u64
        }
    }

    /// Delay after the `attempt`-th failure, with jitter applied.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff_ms(attempt);
        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };
        Duration::from_millis(jittered)
    }

    /// Worst-case total time spent waiting between attempts.
    #[must_use]
    pub fn total_backoff_ms(&self) -> u64 {
        (1..self.max_attempts.max(1))
            .map(|attempt| self.backoff_ms(attempt))
            .fold(0, u64::saturating_add)
    }
}

/// Re-invokes the wrapped construction on retriable failures.
pub struct WithRetry<C> {
    id: String,
    inner: C,
    config: RetryConfig,
}

impl<C> std::fmt::Debug for WithRetry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithRetry")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: SelectiveConstruction> SelectiveConstruction for WithRetry<C> {
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
        self.inner.min_cost()
    }

    fn max_cost(&self) -> CostSemiring {
        let waits = self.config.total_backoff_ms();
        self.inner
            .max_cost()
            .scale(u64::from(self.config.max_attempts.max(1)))
            .add(&CostSemiring::zero().with_latency_ms(waits, waits))
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
impl<I, O, E, C> Construction<I, O, E> for WithRetry<C>
where
    C: Construction<I, O, E>,
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Retriable + std::fmt::Display + Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = self.inner.execute(input.clone(), ctx).await;
            let delay = match outcome.error() {
                None => return outcome,
                Some(error) if !error.is_retriable() => {
                    debug!(
                        construction_id = %self.id,
                        attempt,
                        error = %error,
                        "Failure is not retriable"
                    );
                    return outcome;
                }
                Some(error) if attempt >= max_attempts => {
                    warn!(
                        construction_id = %self.id,
                        attempts = attempt,
                        error = %error,
                        "Retry attempts exhausted"
                    );
                    return outcome;
                }
                Some(error) => {
                    let delay = self.config.delay_for(attempt);
                    debug!(
                        construction_id = %self.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Retrying after failure"
                    );
                    delay
                }
            };

            match ctx.map(ExecutionContext::cancellation) {
                Some(token) => {
                    if token.is_cancelled() {
                        return outcome;
                    }
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = token.cancelled() => {
                            debug!(construction_id = %self.id, "Retry interrupted by cancellation");
                            return outcome;
                        }
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            attempt += 1;
        }
    }
}

/// Retries `inner` while its failures are retriable, up to
/// `config.max_attempts` attempts in total. Exhaustion returns the last
/// failure unchanged.
pub fn with_retry<I, O, E, C>(inner: C, config: RetryConfig) -> WithDiagnostics<WithRetry<C>>
where
    C: Construction<I, O, E>,
{
    WithDiagnostics::new(WithRetry {
        id: format!("retry({})", inner.id()),
        inner,
        config,
    })
}

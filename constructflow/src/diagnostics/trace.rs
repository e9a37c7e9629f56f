//! Execution traces recorded by debug-wrapped constructions.

use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome status of a traced step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step succeeded.
    Succeeded,
    /// The step failed.
    Failed,
}

/// One executed construction inside a traced call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Construction id.
    pub construction_id: String,
    /// Construction name.
    pub construction_name: String,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step finished.
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// Outcome status.
    pub status: StepStatus,
    /// Rust type name of the input.
    pub input_type: String,
    /// Rust type name of the output, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    /// Failure kind, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Failure message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// The trace of one top-level call on a debug-wrapped construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Id of the debugged construction.
    pub root_construction_id: String,
    /// Name of the debugged construction.
    pub root_construction_name: String,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// When the call finished.
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// Recorded steps, in completion order.
    pub steps: Vec<TraceStep>,
    /// Set when the call failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl ExecutionTrace {
    /// Returns the failing steps.
    pub fn failures(&self) -> impl Iterator<Item = &TraceStep> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
    }

    /// Finds the step recorded for `construction_id`.
    #[must_use]
    pub fn step(&self, construction_id: &str) -> Option<&TraceStep> {
        self.steps
            .iter()
            .find(|step| step.construction_id == construction_id)
    }
}

/// Wall-clock and monotonic timer for a step.
#[derive(Debug)]
pub struct StepTimer {
    start: Instant,
    started_at: DateTime<Utc>,
}

impl StepTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// When the timer started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Append-only step buffer for one traced call.
#[derive(Debug)]
pub struct TraceRecorder {
    include_successful_steps: bool,
    steps: Mutex<Vec<TraceStep>>,
}

impl TraceRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new(include_successful_steps: bool) -> Self {
        Self {
            include_successful_steps,
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Returns true if `status` should be recorded.
    #[must_use]
    pub fn records(&self, status: StepStatus) -> bool {
        status == StepStatus::Failed || self.include_successful_steps
    }

    /// Appends a step, unless it is a filtered success.
    pub fn record(&self, step: TraceStep) {
        if self.records(step.status) {
            self.steps.lock().push(step);
        }
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.lock().is_empty()
    }

    /// Freezes the recorded steps into a trace.
    #[must_use]
    pub fn finish(
        &self,
        root_construction_id: &str,
        root_construction_name: &str,
        timer: &StepTimer,
        failed: bool,
    ) -> ExecutionTrace {
        ExecutionTrace {
            root_construction_id: root_construction_id.to_string(),
            root_construction_name: root_construction_name.to_string(),
            started_at: timer.started_at(),
            finished_at: Utc::now(),
            duration_ms: timer.elapsed_ms(),
            steps: std::mem::take(&mut *self.steps.lock()),
            failed,
        }
    }
}

//! Execution context shared by a composition tree.

use super::dependencies::{Dependencies, EVIDENCE_LEDGER};
use crate::cancellation::CancellationToken;
use crate::diagnostics::TraceRecorder;
use crate::evidence::EvidenceLedger;
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// The context threaded through every `execute` call.
///
/// Cloning is cheap: all state is shared. The dependency bag is never
/// mutated in place; [`ExecutionContext::provide`] returns a new context.
#[derive(Clone)]
pub struct ExecutionContext {
    session_id: Arc<str>,
    cancellation: Arc<CancellationToken>,
    dependencies: Dependencies,
    trace: Option<Arc<TraceRecorder>>,
    trace_only: bool,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Creates a context with a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Arc::from(Uuid::new_v4().to_string()),
            cancellation: Arc::new(CancellationToken::new()),
            dependencies: Dependencies::new(),
            trace: None,
            trace_only: false,
        }
    }

    /// A context that only carries a trace recorder.
    ///
    /// Used by debug wrappers invoked without a caller context, so that
    /// combinators requiring a real context still see none.
    #[must_use]
    pub(crate) fn trace_only(recorder: Arc<TraceRecorder>) -> Self {
        Self {
            trace: Some(recorder),
            trace_only: true,
            ..Self::new()
        }
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Arc::from(session_id.into());
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Replaces the dependency bag.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Adds a single dependency.
    #[must_use]
    pub fn with_dependency<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.dependencies.insert(key, value);
        self
    }

    /// Registers the evidence ledger dependency.
    #[must_use]
    pub fn with_evidence_ledger(self, ledger: Arc<dyn EvidenceLedger>) -> Self {
        self.with_dependency(EVIDENCE_LEDGER, ledger)
    }

    /// Returns a context for a subtree with `partial` merged over the
    /// current dependencies. `self` is left unchanged.
    #[must_use]
    pub fn provide(&self, partial: &Dependencies) -> Self {
        Self {
            dependencies: self.dependencies.merged(partial),
            ..self.clone()
        }
    }

    /// Returns a copy carrying `recorder` for the duration of one call.
    #[must_use]
    pub(crate) fn with_trace(&self, recorder: Arc<TraceRecorder>) -> Self {
        Self {
            trace: Some(recorder),
            ..self.clone()
        }
    }

    /// Returns the session id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Checks if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the dependency bag.
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Returns a typed dependency.
    #[must_use]
    pub fn dependency<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.dependencies.get::<T>(key)
    }

    /// Returns the evidence ledger, if one was provided.
    #[must_use]
    pub fn evidence_ledger(&self) -> Option<Arc<dyn EvidenceLedger>> {
        self.dependency::<Arc<dyn EvidenceLedger>>(EVIDENCE_LEDGER)
            .map(|ledger| Arc::clone(&*ledger))
    }

    /// Returns the active trace recorder, if the call is being debugged.
    #[must_use]
    pub fn trace(&self) -> Option<&Arc<TraceRecorder>> {
        self.trace.as_ref()
    }

    /// Returns true if this context was synthesized only to carry a trace.
    #[must_use]
    pub const fn is_trace_only(&self) -> bool {
        self.trace_only
    }
}

/// Strips contexts that exist only to carry a trace.
#[must_use]
pub fn caller_context(ctx: Option<&ExecutionContext>) -> Option<&ExecutionContext> {
    ctx.filter(|c| !c.is_trace_only())
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("session_id", &self.session_id)
            .field("cancelled", &self.is_cancelled())
            .field("dependencies", &self.dependencies)
            .field("tracing", &self.trace.is_some())
            .field("trace_only", &self.trace_only)
            .finish()
    }
}

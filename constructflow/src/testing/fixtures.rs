//! Test fixtures: ready-made execution contexts.

use std::sync::Arc;

use crate::context::{Dependencies, ExecutionContext};
use crate::evidence::{CollectingLedger, EvidenceLedger};

/// Builder for an [`ExecutionContext`] wired to an in-memory ledger.
#[derive(Debug, Default)]
pub struct TestContext {
    session_id: Option<String>,
    dependencies: Dependencies,
}

impl TestContext {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed session id instead of a random one.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.dependencies = self.dependencies.with(key, value);
        self
    }

    /// Builds the context and returns it with the ledger it writes to.
    #[must_use]
    pub fn build(self) -> TestFixture {
        let ledger = Arc::new(CollectingLedger::new());
        let sink: Arc<dyn EvidenceLedger> = ledger.clone();
        let mut ctx = ExecutionContext::new()
            .with_dependencies(self.dependencies)
            .with_evidence_ledger(sink);
        if let Some(session_id) = self.session_id {
            ctx = ctx.with_session_id(session_id);
        }
        TestFixture { ctx, ledger }
    }
}

/// A context paired with the ledger it reports to.
#[derive(Debug, Clone)]
pub struct TestFixture {
    /// The execution context.
    pub ctx: ExecutionContext,
    /// Collects evidence appended through `ctx`.
    pub ledger: Arc<CollectingLedger>,
}

impl TestFixture {
    /// Shorthand for `Some(&self.ctx)`.
    #[must_use]
    pub const fn ctx(&self) -> Option<&ExecutionContext> {
        Some(&self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_wires_ledger_and_dependencies() {
        let fixture = TestContext::new()
            .with_session_id("s-1")
            .with_dependency("limit", 3_u32)
            .build();
        assert_eq!(fixture.ctx.session_id(), "s-1");
        assert_eq!(fixture.ctx.dependency::<u32>("limit").as_deref(), Some(&3));
        assert!(fixture.ctx.evidence_ledger().is_some());
        assert!(fixture.ledger.is_empty());
    }
}

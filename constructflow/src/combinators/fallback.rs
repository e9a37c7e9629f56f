//! Recovery by trying an alternative.

use super::{concat_paths, union, union_paths};
use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConfidenceEstimate, ConstructionOutcome, CostSemiring};
use crate::diagnostics::WithDiagnostics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;

/// Runs `primary`; on failure, runs `backup` on the same input.
pub struct Fallback<P, B> {
    id: String,
    name: String,
    primary: P,
    backup: B,
}

impl<P, B> std::fmt::Debug for Fallback<P, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fallback").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<P, B> SelectiveConstruction for Fallback<P, B>
where
    P: SelectiveConstruction,
    B: SelectiveConstruction,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn estimated_confidence(&self) -> Option<ConfidenceEstimate> {
        self.primary.estimated_confidence()
    }

    fn min_cost(&self) -> CostSemiring {
        self.primary.min_cost()
    }

    fn max_cost(&self) -> CostSemiring {
        self.primary.max_cost().add(&self.backup.max_cost())
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        let primary = self.primary.possible_paths();
        let recovered = concat_paths(&primary, &self.backup.possible_paths());
        union_paths(primary, recovered)
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        union(
            self.primary.dependency_set_upper(),
            self.backup.dependency_set_upper(),
        )
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.primary.dependency_set_lower()
    }
}

#[async_trait]
impl<I, O, E, P, B> Construction<I, O, E> for Fallback<P, B>
where
    P: Construction<I, O, E>,
    B: Construction<I, O, E>,
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        let primary_partial = match self.primary.execute(input.clone(), ctx).await {
            success @ ConstructionOutcome::Success { .. } => return success,
            ConstructionOutcome::Failure {
                partial, error_at, ..
            } => {
                debug!(
                    construction_id = %self.id,
                    failed_at = error_at.as_deref().unwrap_or(self.primary.id()),
                    "Primary failed, running backup"
                );
                partial
            }
        };

        match self.backup.execute(input, ctx).await {
            ConstructionOutcome::Failure {
                error,
                partial: None,
                error_at,
            } => ConstructionOutcome::Failure {
                error,
                partial: primary_partial,
                error_at,
            },
            outcome => outcome,
        }
    }
}

/// Recovery composition. The backup's outcome is authoritative; a backup
/// failure without its own partial inherits the primary's.
pub fn fallback<I, O, E, P, B>(primary: P, backup: B) -> WithDiagnostics<Fallback<P, B>>
where
    P: Construction<I, O, E>,
    B: Construction<I, O, E>,
{
    WithDiagnostics::new(Fallback {
        id: format!("fallback({},{})", primary.id(), backup.id()),
        name: format!("{} <|> {}", primary.name(), backup.name()),
        primary,
        backup,
    })
}

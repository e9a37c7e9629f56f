//! Selective composition: branching with statically known bounds.
//!
//! Cost bounds, paths and dependency sets of `select` and `branch` are
//! computed from their children alone, so a caller can budget a
//! composition before running it.

use super::{concat_paths, union, union_paths};
use crate::constructions::{Construction, SelectiveConstruction};
use crate::context::ExecutionContext;
use crate::core::{ConstructionOutcome, CostSemiring, Either};
use crate::diagnostics::WithDiagnostics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::marker::PhantomData;

/// Runs `if_left` only when the condition yields `Left`.
pub struct Select<Cd, L, A> {
    id: String,
    name: String,
    condition: Cd,
    if_left: L,
    _left: PhantomData<fn() -> A>,
}

impl<Cd, L, A> std::fmt::Debug for Select<Cd, L, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Select").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<Cd, L, A> SelectiveConstruction for Select<Cd, L, A>
where
    Cd: SelectiveConstruction,
    L: SelectiveConstruction,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_cost(&self) -> CostSemiring {
        self.condition
            .min_cost()
            .add(&self.if_left.min_cost().alt_min(&CostSemiring::zero()))
    }

    fn max_cost(&self) -> CostSemiring {
        self.condition
            .max_cost()
            .add(&self.if_left.max_cost().alt_max(&CostSemiring::zero()))
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        let bypass = self.condition.possible_paths();
        let taken = concat_paths(&bypass, &self.if_left.possible_paths());
        union_paths(bypass, taken)
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        union(
            self.condition.dependency_set_upper(),
            self.if_left.dependency_set_upper(),
        )
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.condition.dependency_set_lower()
    }
}

#[async_trait]
impl<I, A, O, E, Cd, L> Construction<I, O, E> for Select<Cd, L, A>
where
    Cd: Construction<I, Either<A, O>, E>,
    L: Construction<A, O, E>,
    I: Send + 'static,
    A: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        match self.condition.execute(input, ctx).await {
            ConstructionOutcome::Success {
                value: Either::Right(value),
            } => ConstructionOutcome::success(value),
            ConstructionOutcome::Success {
                value: Either::Left(value),
            } => self.if_left.execute(value, ctx).await,
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

/// Conditional composition: `Right(b)` bypasses `if_left` and is returned
/// as-is; `Left(a)` is fed into `if_left`.
pub fn select<I, A, O, E, Cd, L>(condition: Cd, if_left: L) -> WithDiagnostics<Select<Cd, L, A>>
where
    Cd: Construction<I, Either<A, O>, E>,
    L: Construction<A, O, E>,
{
    WithDiagnostics::new(Select {
        id: format!("select({},{})", condition.id(), if_left.id()),
        name: format!("{} ?> {}", condition.name(), if_left.name()),
        condition,
        if_left,
        _left: PhantomData,
    })
}

/// Runs one of two continuations depending on the condition.
pub struct Branch<Cd, L, R, A, B> {
    id: String,
    name: String,
    condition: Cd,
    if_left: L,
    if_right: R,
    _sides: PhantomData<fn() -> (A, B)>,
}

impl<Cd, L, R, A, B> std::fmt::Debug for Branch<Cd, L, R, A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<Cd, L, R, A, B> SelectiveConstruction for Branch<Cd, L, R, A, B>
where
    Cd: SelectiveConstruction,
    L: SelectiveConstruction,
    R: SelectiveConstruction,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_cost(&self) -> CostSemiring {
        self.condition
            .min_cost()
            .add(&self.if_left.min_cost().alt_min(&self.if_right.min_cost()))
    }

    fn max_cost(&self) -> CostSemiring {
        self.condition
            .max_cost()
            .add(&self.if_left.max_cost().alt_max(&self.if_right.max_cost()))
    }

    fn possible_paths(&self) -> Vec<Vec<String>> {
        let condition = self.condition.possible_paths();
        union_paths(
            concat_paths(&condition, &self.if_left.possible_paths()),
            concat_paths(&condition, &self.if_right.possible_paths()),
        )
    }

    fn dependency_set_upper(&self) -> BTreeSet<String> {
        union(
            union(
                self.condition.dependency_set_upper(),
                self.if_left.dependency_set_upper(),
            ),
            self.if_right.dependency_set_upper(),
        )
    }

    fn dependency_set_lower(&self) -> BTreeSet<String> {
        self.condition.dependency_set_lower()
    }
}

#[async_trait]
impl<I, A, B, O, E, Cd, L, R> Construction<I, O, E> for Branch<Cd, L, R, A, B>
where
    Cd: Construction<I, Either<A, B>, E>,
    L: Construction<A, O, E>,
    R: Construction<B, O, E>,
    I: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    async fn execute(&self, input: I, ctx: Option<&ExecutionContext>) -> ConstructionOutcome<O, E> {
        match self.condition.execute(input, ctx).await {
            ConstructionOutcome::Success {
                value: Either::Left(value),
            } => self.if_left.execute(value, ctx).await,
            ConstructionOutcome::Success {
                value: Either::Right(value),
            } => self.if_right.execute(value, ctx).await,
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

/// Two-way conditional composition.
pub fn branch<I, A, B, O, E, Cd, L, R>(
    condition: Cd,
    if_left: L,
    if_right: R,
) -> WithDiagnostics<Branch<Cd, L, R, A, B>>
where
    Cd: Construction<I, Either<A, B>, E>,
    L: Construction<A, O, E>,
    R: Construction<B, O, E>,
{
    WithDiagnostics::new(Branch {
        id: format!(
            "branch({},{},{})",
            condition.id(),
            if_left.id(),
            if_right.id()
        ),
        name: format!(
            "{} ? {} : {}",
            condition.name(),
            if_left.name(),
            if_right.name()
        ),
        condition,
        if_left,
        if_right,
        _sides: PhantomData,
    })
}

//! Testing utilities for construction compositions.
//!
//! This module provides:
//! - Mock, counting, failing and metered constructions
//! - Assertions for construction outcomes
//! - Execution context fixtures backed by an in-memory evidence ledger

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_error_at, assert_failure, assert_failure_kind, assert_partial, assert_success,
};
pub use fixtures::{TestContext, TestFixture};
pub use mocks::{
    CountingConstruction, FailingConstruction, MeteredConstruction, MockConstruction,
    SlowConstruction,
};

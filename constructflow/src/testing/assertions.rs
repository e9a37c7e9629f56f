//! Test assertions for construction outcomes.

use std::fmt::Debug;

use crate::core::ConstructionOutcome;
use crate::errors::{ConstructionError, ErrorKind};

/// Asserts that the outcome is a success and returns its value.
#[track_caller]
pub fn assert_success<O, E: Debug>(outcome: &ConstructionOutcome<O, E>) -> &O {
    match outcome {
        ConstructionOutcome::Success { value } => value,
        ConstructionOutcome::Failure { error, error_at, .. } => {
            panic!("Expected success, got failure at {error_at:?}: {error:?}")
        }
    }
}

/// Asserts that the outcome is a failure and returns its error.
#[track_caller]
pub fn assert_failure<O, E>(outcome: &ConstructionOutcome<O, E>) -> &E {
    match outcome {
        ConstructionOutcome::Failure { error, .. } => error,
        ConstructionOutcome::Success { .. } => panic!("Expected failure, got success"),
    }
}

/// Asserts that the outcome failed with an error of the given kind.
#[track_caller]
pub fn assert_failure_kind<O>(outcome: &ConstructionOutcome<O, ConstructionError>, expected: ErrorKind) {
    let error = assert_failure(outcome);
    assert_eq!(
        error.kind(),
        expected,
        "Expected failure kind {expected:?}, got {:?}: {error}",
        error.kind()
    );
}

/// Asserts where the failure originated.
#[track_caller]
pub fn assert_error_at<O, E>(outcome: &ConstructionOutcome<O, E>, expected: &str) {
    assert!(outcome.is_failure(), "Expected failure at '{expected}', got success");
    assert_eq!(
        outcome.error_at(),
        Some(expected),
        "Expected failure at '{expected}', got {:?}",
        outcome.error_at()
    );
}

/// Asserts that a failure carries a partial result of type `T` equal to `expected`.
#[track_caller]
pub fn assert_partial<O, E, T>(outcome: &ConstructionOutcome<O, E>, expected: &T)
where
    T: PartialEq + Debug + 'static,
{
    let partial = outcome
        .partial()
        .unwrap_or_else(|| panic!("Expected a partial result, found none"));
    let actual = partial.downcast_ref::<T>().unwrap_or_else(|| {
        panic!(
            "Expected partial of type {}, found {}",
            std::any::type_name::<T>(),
            partial.type_name()
        )
    });
    assert_eq!(actual, expected);
}

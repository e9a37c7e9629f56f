//! Combinators composing constructions into larger ones.
//!
//! Every combinator owns its children and returns a [`WithDiagnostics`]
//! wrapper, so traced executions record one step per composed node.
//!
//! [`WithDiagnostics`]: crate::diagnostics::WithDiagnostics

/// Delegates the static surface, except identity, to a wrapped child.
macro_rules! delegate_bounds {
    ($field:ident) => {
        fn estimated_confidence(&self) -> Option<$crate::core::ConfidenceEstimate> {
            self.$field.estimated_confidence()
        }

        fn min_cost(&self) -> $crate::core::CostSemiring {
            self.$field.min_cost()
        }

        fn max_cost(&self) -> $crate::core::CostSemiring {
            self.$field.max_cost()
        }

        fn possible_paths(&self) -> Vec<Vec<String>> {
            self.$field.possible_paths()
        }

        fn dependency_set_upper(&self) -> std::collections::BTreeSet<String> {
            self.$field.dependency_set_upper()
        }

        fn dependency_set_lower(&self) -> std::collections::BTreeSet<String> {
            self.$field.dependency_set_lower()
        }
    };
}

mod fallback;
mod fanout;
mod fix;
mod map;
mod provide;
mod retry;
mod selective;
mod seq;
mod timeout;

pub use fallback::{fallback, Fallback};
pub use fanout::{fanout, fanout_with_aggregator, Fanout};
pub use fix::{
    fix, Fix, FixConfig, FixMetric, Fixpoint, FixpointMetadata, TerminationReason, MAX_FIX_PATHS,
};
pub use map::{contramap, dimap, map, map_async, map_error, Dimap, MapAsync, MapError};
pub use provide::{provide, Provide};
pub use retry::{with_retry, JitterStrategy, RetryConfig, WithRetry};
pub use selective::{branch, select, Branch, Select};
pub use seq::{seq, seq_with_aggregator, Seq};
pub use timeout::{with_timeout, WithTimeout};

use crate::core::{ConfidenceAggregator, ConfidenceEstimate};
use std::collections::BTreeSet;

/// Every path of `first` followed by every path of `second`.
pub(crate) fn concat_paths(first: &[Vec<String>], second: &[Vec<String>]) -> Vec<Vec<String>> {
    first
        .iter()
        .flat_map(|head| {
            second.iter().map(move |tail| {
                let mut path = head.clone();
                path.extend(tail.iter().cloned());
                path
            })
        })
        .collect()
}

/// Appends the paths of `extra` not already present in `paths`.
pub(crate) fn union_paths(mut paths: Vec<Vec<String>>, extra: Vec<Vec<String>>) -> Vec<Vec<String>> {
    for path in extra {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

pub(crate) fn union(mut a: BTreeSet<String>, b: BTreeSet<String>) -> BTreeSet<String> {
    a.extend(b);
    a
}

/// Aggregates two estimates in execution order; `None` unless both exist.
pub(crate) fn sequence_pair(
    aggregator: &dyn ConfidenceAggregator,
    first: Option<ConfidenceEstimate>,
    second: Option<ConfidenceEstimate>,
) -> Option<ConfidenceEstimate> {
    match (first, second) {
        (Some(a), Some(b)) => Some(aggregator.sequence(&[a, b])),
        _ => None,
    }
}

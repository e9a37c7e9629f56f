//! Cooperative cancellation.
//!
//! The engine never preempts a running executor. Leaf executors observe the
//! token carried by the execution context and fail with the cancelled kind.

mod token;

pub use token::CancellationToken;

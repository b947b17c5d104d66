//! Bounded retry scheduling for windows that are not modifiable yet.
//!
//! Entries are evaluated by a periodic sweep rather than per-window timers,
//! which keeps shutdown trivial: the sweep simply stops being invoked.

pub mod handler;
pub mod types;

pub use handler::RetryQueue;
pub use types::{BackoffPolicy, RetryEntry, RetryPolicy};

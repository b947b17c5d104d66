//! Per-process coordination of window modification.
//!
//! The coordinator ties the process-local pieces together: lifecycle events
//! feed the readiness tracker; ready, eligible windows are checked against
//! the shared registry and modified at most once; windows that are not
//! modifiable yet go to the retry queue, which a periodic sweep drains.
//! Everything here runs on the single worker that delivers events and calls
//! the sweep - only the registry underneath is shared with other processes.

pub mod handler;

pub use handler::{Coordinator, SweepStats};

//! veil-core: Cross-process window modification coordination
//!
//! This library lets the cooperating processes of a multi-process application
//! agree on which on-screen windows have already had their attributes modified
//! (always-on-top, non-activating, screenshot-exclusion, opacity), so that
//! each window is modified exactly once even when several processes observe
//! it. It is used by the injected per-process worker and by the `veil` CLI.
//!
//! # Main Entry Points
//!
//! - [`registry`] - Shared cross-process registry of modified windows
//! - [`coordinator`] - Per-process event intake, readiness gating and retries
//! - [`tracker`] - Window readiness state machine and classification
//! - [`retry`] - Bounded retry scheduling for not-yet-ready windows
//! - [`config`] - Configuration management

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod logging;
pub mod process;
pub mod registry;
pub mod retry;
pub mod tracker;
pub mod windows;

// Re-export commonly used types at crate root for convenience
pub use config::{Config, VeilConfig};
pub use coordinator::{Coordinator, SweepStats};
pub use registry::types::{RegistryMode, RegistrySettings, StoreBackend, WindowRecord};
pub use registry::{Registry, RegistryError};
pub use retry::{BackoffPolicy, RetryPolicy, RetryQueue};
pub use tracker::types::{InitFlags, WindowClass, WindowInitState};
pub use tracker::WindowTracker;
pub use windows::types::{ModificationOptions, WindowEvent, WindowId, WindowMetadata};
pub use windows::{DryRunWindowSystem, WindowSystem, WindowSystemError};

// Re-export logging initialization
pub use logging::init_logging;

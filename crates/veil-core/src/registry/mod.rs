//! Cross-process registry of modified windows.
//!
//! The registry is the single source of cross-process truth: every
//! cooperating process consults it before modifying a window and records the
//! window after a successful modification, so each window is modified exactly
//! once across process boundaries. Two interchangeable backing stores are
//! provided (advisory-locked file, POSIX shared memory with a process-shared
//! mutex) plus a process-local standalone fallback used when neither can be
//! initialized.

pub mod backends;
pub mod errors;
pub mod handler;
pub mod traits;
pub mod types;

pub use errors::RegistryError;
pub use handler::Registry;
pub use traits::RegistryStore;

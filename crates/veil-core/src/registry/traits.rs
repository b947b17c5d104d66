use crate::registry::errors::RegistryError;
use crate::registry::types::{RegistryMode, WindowRecord};

/// Backing store for the cross-process registry.
///
/// Implementations serialize every operation through their own cross-process
/// mutual-exclusion primitive with bounded acquisition; an operation that
/// cannot get the lock fails with `LockTimeout` instead of blocking
/// indefinitely. `window_id` arguments are nonzero - 0 is the reserved
/// sentinel and is rejected at the service layer.
pub trait RegistryStore: Send {
    fn mode(&self) -> RegistryMode;

    /// Record a window as modified by `process_id`, or refresh its timestamp
    /// if a record already exists. Holds the exclusive lock across the whole
    /// search-then-insert sequence. At capacity the store reclaims stale
    /// records once and retries; if still full it fails with
    /// `CapacityExceeded` and leaves existing records untouched.
    fn mark_modified(&mut self, window_id: u32, process_id: i32) -> Result<(), RegistryError>;

    /// Whether a live record exists for the window. Read-locked.
    fn is_modified(&self, window_id: u32) -> Result<bool, RegistryError>;

    /// Number of live records, for diagnostics.
    fn count_modified(&self) -> Result<u32, RegistryError>;

    /// Add the process to the live-process set. Idempotent.
    fn register_process(&mut self, process_id: i32) -> Result<(), RegistryError>;

    /// Remove the process from the live-process set. Idempotent.
    fn unregister_process(&mut self, process_id: i32) -> Result<(), RegistryError>;

    /// Purge records whose owner is no longer live or whose age exceeds the
    /// staleness horizon, then compact. Returns the number of purged
    /// records. When `force` is false the store may skip the pass if one ran
    /// recently.
    fn reclaim(&mut self, force: bool) -> Result<usize, RegistryError>;

    /// All live records, for diagnostics.
    fn snapshot(&self) -> Result<Vec<WindowRecord>, RegistryError>;

    /// Release store resources. Called once on close; must be safe to call
    /// after a failed operation.
    fn detach(&mut self) -> Result<(), RegistryError>;
}

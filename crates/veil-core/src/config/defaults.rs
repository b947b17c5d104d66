//! Built-in default values for configuration fields.

/// Default registry backend.
pub const DEFAULT_BACKEND: &str = "file";

/// Default file-backed registry capacity (window records).
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default staleness horizon in minutes.
pub const DEFAULT_STALENESS_MINUTES: u64 = 60;

/// Default minimum interval between reclamation passes, in seconds.
pub const DEFAULT_RECLAIM_INTERVAL_SECS: u64 = 60;

/// Default POSIX shared-memory segment name.
pub const DEFAULT_SHM_NAME: &str = "/veil-registry";

/// Default maximum retry attempts per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default retry interval in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;

/// Default exponential backoff ceiling in milliseconds.
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 5000;

/// Default tracker idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, VeilConfig, defaults};

/// Fixed capacity of the shared-memory record array.
pub const SHM_MAX_RECORDS: usize = 2048;

/// Fixed capacity of the shared-memory live-process table.
pub const SHM_MAX_PROCESSES: usize = 256;

/// Bounded lock acquisition: attempts for essential writes.
pub const EXCLUSIVE_LOCK_ATTEMPTS: u32 = 5;

/// Bounded lock acquisition: attempts for reads.
pub const SHARED_LOCK_ATTEMPTS: u32 = 3;

/// Base sleep between lock attempts; attempt `n` sleeps `n` times this.
pub const LOCK_RETRY_BASE: Duration = Duration::from_millis(10);

/// One registered window in the shared registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowRecord {
    /// Window identifier; 0 is the reserved sentinel and never a real window.
    pub window_id: u32,
    /// Process that performed the modification.
    pub process_id: i32,
    /// Unix timestamp of the most recent successful modification.
    pub last_modified_at: i64,
}

/// How this process's registry handle came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    /// This process initialized a fresh store.
    Created,
    /// Attached to a store another process already initialized.
    Joined,
    /// Cross-process coordination unavailable; local-only idempotency.
    Standalone,
}

impl std::fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryMode::Created => write!(f, "created"),
            RegistryMode::Joined => write!(f, "joined"),
            RegistryMode::Standalone => write!(f, "standalone"),
        }
    }
}

/// Which backing store to use for the shared registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    File,
    SharedMemory,
}

/// Resolved runtime settings for opening a registry.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub backend: StoreBackend,
    /// Data file of the file-backed store.
    pub data_path: PathBuf,
    /// Advisory lock file guarding the data file.
    pub lock_path: PathBuf,
    /// POSIX shared-memory segment name (shared-memory backend).
    pub shm_name: String,
    /// Record capacity of the file-backed store.
    pub capacity: usize,
    /// Age after which a record is stale regardless of owner liveness.
    pub staleness_horizon: Duration,
    /// Minimum interval between reclamation passes.
    pub reclaim_interval: Duration,
}

impl RegistrySettings {
    /// Resolve settings from the runtime config and the merged file config.
    pub fn from_config(config: &Config, veil_config: &VeilConfig) -> Self {
        let registry = &veil_config.registry;
        let backend = match registry.backend.as_deref() {
            Some("shared-memory") => StoreBackend::SharedMemory,
            _ => StoreBackend::File,
        };
        Self {
            backend,
            data_path: config.registry_file(),
            lock_path: config.registry_lock_file(),
            shm_name: registry
                .shm_name
                .clone()
                .unwrap_or_else(|| defaults::DEFAULT_SHM_NAME.to_string()),
            capacity: registry.capacity.unwrap_or(defaults::DEFAULT_CAPACITY),
            staleness_horizon: Duration::from_secs(
                registry
                    .staleness_minutes
                    .unwrap_or(defaults::DEFAULT_STALENESS_MINUTES)
                    * 60,
            ),
            reclaim_interval: Duration::from_secs(
                registry
                    .reclaim_interval_secs
                    .unwrap_or(defaults::DEFAULT_RECLAIM_INTERVAL_SECS),
            ),
        }
    }

    /// File-backed settings rooted at an arbitrary directory.
    ///
    /// Used by tests and by diagnostics against a non-default location.
    pub fn file_in_dir(dir: &std::path::Path) -> Self {
        Self {
            backend: StoreBackend::File,
            data_path: dir.join("registry.dat"),
            lock_path: dir.join("registry.lock"),
            shm_name: defaults::DEFAULT_SHM_NAME.to_string(),
            capacity: defaults::DEFAULT_CAPACITY,
            staleness_horizon: Duration::from_secs(defaults::DEFAULT_STALENESS_MINUTES * 60),
            reclaim_interval: Duration::from_secs(defaults::DEFAULT_RECLAIM_INTERVAL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_mode_display() {
        assert_eq!(RegistryMode::Created.to_string(), "created");
        assert_eq!(RegistryMode::Joined.to_string(), "joined");
        assert_eq!(RegistryMode::Standalone.to_string(), "standalone");
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = RegistrySettings::from_config(&Config::new(), &VeilConfig::default());
        assert_eq!(settings.backend, StoreBackend::File);
        assert_eq!(settings.capacity, 1024);
        assert_eq!(settings.staleness_horizon, Duration::from_secs(3600));
        assert_eq!(settings.shm_name, "/veil-registry");
        assert!(settings.data_path.ends_with("veil/registry.dat"));
    }

    #[test]
    fn test_settings_select_shared_memory_backend() {
        let veil_config: VeilConfig = toml::from_str(
            r#"
            [registry]
            backend = "shared-memory"
            shm_name = "/veil-custom"
            "#,
        )
        .unwrap();
        let settings = RegistrySettings::from_config(&Config::new(), &veil_config);
        assert_eq!(settings.backend, StoreBackend::SharedMemory);
        assert_eq!(settings.shm_name, "/veil-custom");
    }
}

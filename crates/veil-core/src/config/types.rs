//! Configuration type definitions for veil.
//!
//! These types are serialized/deserialized from TOML config files.
//!
//! # Example Configuration
//!
//! ```toml
//! [registry]
//! backend = "file"
//! capacity = 1024
//! staleness_minutes = 60
//!
//! [retry]
//! max_attempts = 5
//! interval_ms = 500
//!
//! [options]
//! keep_above = true
//! exclude_from_capture = true
//! opacity = 0.9
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::windows::types::ModificationOptions;

/// Runtime configuration for veil.
///
/// This struct holds paths and settings that are derived from environment
/// variables and system defaults, not from config files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cross-process registry state.
    /// Lives under the system temp directory so every cooperating process
    /// on the host resolves the same path.
    pub registry_dir: PathBuf,
    /// Log level for the application
    pub log_level: String,
}

impl Config {
    pub fn new() -> Self {
        Self {
            registry_dir: std::env::temp_dir().join("veil"),
            log_level: std::env::var("VEIL_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Path of the file-backed registry data file.
    pub fn registry_file(&self) -> PathBuf {
        self.registry_dir.join("registry.dat")
    }

    /// Path of the advisory lock file guarding the registry data file.
    pub fn registry_lock_file(&self) -> PathBuf {
        self.registry_dir.join("registry.lock")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Main configuration loaded from TOML config files.
///
/// Loaded from:
/// 1. User config: `~/.veil/config.toml`
/// 2. Project config: `./.veil/config.toml`
///
/// Project config values override user config values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VeilConfig {
    /// Shared registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Retry scheduling configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Readiness tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Window modification options applied to eligible windows.
    /// `None` when no config file carries an `[options]` section, so a merge
    /// can tell "absent" apart from "explicitly all-default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ModificationOptions>,
}

impl VeilConfig {
    /// Load and merge configuration from the config file hierarchy.
    pub fn load_hierarchy() -> Result<Self, Box<dyn std::error::Error>> {
        super::loading::load_hierarchy()
    }
}

/// Shared registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Backing store: "file" (advisory file locks) or "shared-memory"
    /// (process-shared mutex). Default: "file".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Maximum number of window records in the file-backed store.
    /// The shared-memory store has a fixed compile-time capacity.
    /// Default: 1024.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Age in minutes after which a record is considered stale regardless
    /// of owner liveness. Default: 60 minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staleness_minutes: Option<u64>,

    /// Minimum interval in seconds between stale-record reclamation passes.
    /// Default: 60 seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_interval_secs: Option<u64>,

    /// Name of the POSIX shared-memory segment (shared-memory backend only).
    /// Must start with '/'. Default: "/veil-registry".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm_name: Option<String>,
}

/// Retry scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetryConfig {
    /// Maximum re-attempts per window before it is abandoned.
    /// Default: 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Base delay in milliseconds between re-attempts. Default: 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    /// Use capped exponential backoff instead of a fixed interval.
    #[serde(default)]
    pub exponential: bool,

    /// Backoff ceiling in milliseconds when `exponential` is set.
    /// Default: 5000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,
}

/// Readiness tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    /// Seconds after which a window that never became ready and produced no
    /// further lifecycle events is dropped from tracking. Default: 300.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_paths() {
        let config = Config::new();
        assert!(config.registry_dir.ends_with("veil"));
        assert!(config.registry_file().ends_with("veil/registry.dat"));
        assert!(config.registry_lock_file().ends_with("veil/registry.lock"));
    }

    #[test]
    fn test_veil_config_default_is_empty() {
        let config = VeilConfig::default();
        assert!(config.registry.backend.is_none());
        assert!(config.retry.max_attempts.is_none());
        assert!(config.tracker.idle_timeout_secs.is_none());
        assert!(config.options.is_none());
    }

    #[test]
    fn test_veil_config_parses_partial_toml() {
        let config: VeilConfig = toml::from_str(
            r#"
            [registry]
            backend = "shared-memory"

            [retry]
            max_attempts = 3
            exponential = true
            "#,
        )
        .expect("Failed to parse config");

        assert_eq!(config.registry.backend.as_deref(), Some("shared-memory"));
        assert_eq!(config.retry.max_attempts, Some(3));
        assert!(config.retry.exponential);
        assert!(config.registry.capacity.is_none());
    }

    #[test]
    fn test_veil_config_parses_options() {
        let config: VeilConfig = toml::from_str(
            r#"
            [options]
            keep_above = false
            opacity = 0.5
            "#,
        )
        .expect("Failed to parse config");

        let options = config.options.expect("[options] section should parse");
        assert!(!options.keep_above);
        assert!((options.opacity - 0.5).abs() < f32::EPSILON);
        // Unset fields fall back to their defaults
        assert!(options.exclude_from_capture);
    }
}

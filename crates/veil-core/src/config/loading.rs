//! Configuration loading and merging logic.
//!
//! Configuration is loaded in the following order (later sources override
//! earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.veil/config.toml` (global user preferences)
//! 3. **Project config** - `./.veil/config.toml` (project-specific overrides)

use std::fs;
use std::path::PathBuf;

use crate::config::types::{RegistryConfig, RetryConfig, TrackerConfig, VeilConfig};
use crate::config::validation::validate_config;

/// Check if an error is a "file not found" error.
fn is_file_not_found(e: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
        return io_err.kind() == std::io::ErrorKind::NotFound;
    }

    let err_str = e.to_string();
    err_str.contains("No such file or directory") || err_str.contains("cannot find the path")
}

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if validation fails. Missing config files are not errors.
pub fn load_hierarchy() -> Result<VeilConfig, Box<dyn std::error::Error>> {
    let mut config = VeilConfig::default();

    // Load user config (file not found is expected, parse errors fail)
    match load_user_config() {
        Ok(user_config) => config = merge_configs(config, user_config),
        Err(e) if !is_file_not_found(e.as_ref()) => return Err(e),
        Err(_) => {} // File not found - continue with defaults
    }

    // Load project config (file not found is expected, parse errors fail)
    match load_project_config() {
        Ok(project_config) => config = merge_configs(config, project_config),
        Err(e) if !is_file_not_found(e.as_ref()) => return Err(e),
        Err(_) => {} // File not found - continue with merged config
    }

    validate_config(&config)?;

    Ok(config)
}

/// Load the user configuration from ~/.veil/config.toml.
fn load_user_config() -> Result<VeilConfig, Box<dyn std::error::Error>> {
    let home_dir = dirs::home_dir().ok_or("Could not find home directory")?;
    let config_path = home_dir.join(".veil").join("config.toml");
    load_config_file(&config_path)
}

/// Load the project configuration from ./.veil/config.toml.
fn load_project_config() -> Result<VeilConfig, Box<dyn std::error::Error>> {
    let config_path = std::env::current_dir()?.join(".veil").join("config.toml");
    load_config_file(&config_path)
}

/// Load a configuration file from the given path.
fn load_config_file(path: &PathBuf) -> Result<VeilConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
    let config: VeilConfig = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
    Ok(config)
}

/// Merge two configurations, with override_config taking precedence.
///
/// Optional fields from the override replace base values only if present.
pub fn merge_configs(base: VeilConfig, override_config: VeilConfig) -> VeilConfig {
    VeilConfig {
        registry: RegistryConfig {
            backend: override_config.registry.backend.or(base.registry.backend),
            capacity: override_config.registry.capacity.or(base.registry.capacity),
            staleness_minutes: override_config
                .registry
                .staleness_minutes
                .or(base.registry.staleness_minutes),
            reclaim_interval_secs: override_config
                .registry
                .reclaim_interval_secs
                .or(base.registry.reclaim_interval_secs),
            shm_name: override_config.registry.shm_name.or(base.registry.shm_name),
        },
        retry: RetryConfig {
            max_attempts: override_config.retry.max_attempts.or(base.retry.max_attempts),
            interval_ms: override_config.retry.interval_ms.or(base.retry.interval_ms),
            exponential: override_config.retry.exponential || base.retry.exponential,
            max_interval_ms: override_config
                .retry
                .max_interval_ms
                .or(base.retry.max_interval_ms),
        },
        tracker: TrackerConfig {
            idle_timeout_secs: override_config
                .tracker
                .idle_timeout_secs
                .or(base.tracker.idle_timeout_secs),
        },
        // An [options] section overrides wholesale; a config file without
        // one leaves the other layer's options in place.
        options: override_config.options.or(base.options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_override_values() {
        let base: VeilConfig = toml::from_str(
            r#"
            [registry]
            backend = "file"
            capacity = 64

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        let override_config: VeilConfig = toml::from_str(
            r#"
            [registry]
            backend = "shared-memory"
            "#,
        )
        .unwrap();

        let merged = merge_configs(base, override_config);
        assert_eq!(merged.registry.backend.as_deref(), Some("shared-memory"));
        // Fields absent from the override keep the base values
        assert_eq!(merged.registry.capacity, Some(64));
        assert_eq!(merged.retry.max_attempts, Some(5));
    }

    #[test]
    fn test_merge_empty_override_keeps_base() {
        let base: VeilConfig = toml::from_str(
            r#"
            [retry]
            interval_ms = 250
            exponential = true
            "#,
        )
        .unwrap();

        let merged = merge_configs(base, VeilConfig::default());
        assert_eq!(merged.retry.interval_ms, Some(250));
        assert!(merged.retry.exponential);
    }

    #[test]
    fn test_merge_keeps_user_options_when_project_omits_them() {
        let base: VeilConfig = toml::from_str(
            r#"
            [options]
            keep_above = false
            "#,
        )
        .unwrap();
        let override_config: VeilConfig = toml::from_str(
            r#"
            [registry]
            capacity = 32
            "#,
        )
        .unwrap();

        // The project config has no [options] section; the user's explicit
        // keep_above = false must survive the merge.
        let merged = merge_configs(base, override_config);
        let options = merged.options.expect("user options should be kept");
        assert!(!options.keep_above);
        assert_eq!(merged.registry.capacity, Some(32));
    }

    #[test]
    fn test_merge_project_options_override_user_options() {
        let base: VeilConfig = toml::from_str(
            r#"
            [options]
            keep_above = false
            "#,
        )
        .unwrap();
        let override_config: VeilConfig = toml::from_str(
            r#"
            [options]
            opacity = 0.5
            "#,
        )
        .unwrap();

        let merged = merge_configs(base, override_config);
        let options = merged.options.unwrap();
        assert!((options.opacity - 0.5).abs() < f32::EPSILON);
        // The project [options] section replaces the user's wholesale.
        assert!(options.keep_above);
    }

    #[test]
    fn test_is_file_not_found() {
        let io_err: Box<dyn std::error::Error> =
            Box::new(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(is_file_not_found(io_err.as_ref()));

        let other: Box<dyn std::error::Error> = "Failed to parse config file".to_string().into();
        assert!(!is_file_not_found(other.as_ref()));
    }
}

//! Validation of the merged configuration.

use crate::config::types::VeilConfig;
use crate::errors::ConfigError;

const SUPPORTED_BACKENDS: &[&str] = &["file", "shared-memory"];

pub fn validate_config(config: &VeilConfig) -> Result<(), ConfigError> {
    if let Some(backend) = &config.registry.backend
        && !SUPPORTED_BACKENDS.contains(&backend.as_str())
    {
        return Err(ConfigError::InvalidBackend {
            backend: backend.clone(),
        });
    }

    if let Some(name) = &config.registry.shm_name
        && !name.starts_with('/')
    {
        return Err(ConfigError::InvalidConfiguration {
            message: format!("shm_name '{}' must start with '/'", name),
        });
    }

    if config.registry.capacity == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "registry capacity must be at least 1".to_string(),
        });
    }

    if config.retry.max_attempts == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "retry max_attempts must be at least 1".to_string(),
        });
    }

    if let Some(options) = &config.options
        && !(0.0..=1.0).contains(&options.opacity)
    {
        return Err(ConfigError::InvalidConfiguration {
            message: format!(
                "options opacity {} is outside the valid range 0.0-1.0",
                options.opacity
            ),
        });
    }

    Ok(())
}

use crate::errors::VeilError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry initialization failed: {message}")]
    InitializationFailed { message: String },

    #[error("Could not acquire registry lock for {operation} after {attempts} attempts")]
    LockTimeout {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Registry is full ({capacity} records) even after reclamation")]
    CapacityExceeded { capacity: usize },

    #[error("Registry store is corrupted: {message}")]
    StoreCorrupted { message: String },

    #[error("Registry IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl VeilError for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::InitializationFailed { .. } => "REGISTRY_INIT_FAILED",
            RegistryError::LockTimeout { .. } => "REGISTRY_LOCK_TIMEOUT",
            RegistryError::CapacityExceeded { .. } => "REGISTRY_CAPACITY_EXCEEDED",
            RegistryError::StoreCorrupted { .. } => "REGISTRY_STORE_CORRUPTED",
            RegistryError::IoError { .. } => "REGISTRY_IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_display() {
        let error = RegistryError::LockTimeout {
            operation: "mark_modified",
            attempts: 5,
        };
        assert_eq!(
            error.to_string(),
            "Could not acquire registry lock for mark_modified after 5 attempts"
        );
        assert_eq!(error.error_code(), "REGISTRY_LOCK_TIMEOUT");
        assert!(!error.is_user_error());
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let error = RegistryError::CapacityExceeded { capacity: 4 };
        assert_eq!(
            error.to_string(),
            "Registry is full (4 records) even after reclamation"
        );
        assert_eq!(error.error_code(), "REGISTRY_CAPACITY_EXCEEDED");
    }
}

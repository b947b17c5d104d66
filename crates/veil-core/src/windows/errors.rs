use crate::errors::VeilError;

#[derive(Debug, thiserror::Error)]
pub enum WindowSystemError {
    #[error("Window {window_id} not found")]
    WindowNotFound { window_id: u32 },

    #[error("Window {window_id} is not ready for modification yet")]
    NotReady { window_id: u32 },

    #[error("Modification of window {window_id} failed: {message}")]
    OperationFailed { window_id: u32, message: String },

    #[error("Window system connection unavailable: {message}")]
    ConnectionUnavailable { message: String },
}

impl WindowSystemError {
    /// Whether the failed operation is worth retrying later.
    ///
    /// A missing window is gone for good; everything else may succeed once
    /// the window or the connection settles.
    pub fn is_transient(&self) -> bool {
        !matches!(self, WindowSystemError::WindowNotFound { .. })
    }
}

impl VeilError for WindowSystemError {
    fn error_code(&self) -> &'static str {
        match self {
            WindowSystemError::WindowNotFound { .. } => "WINDOW_NOT_FOUND",
            WindowSystemError::NotReady { .. } => "WINDOW_NOT_READY",
            WindowSystemError::OperationFailed { .. } => "WINDOW_OPERATION_FAILED",
            WindowSystemError::ConnectionUnavailable { .. } => "WINDOW_CONNECTION_UNAVAILABLE",
        }
    }
}

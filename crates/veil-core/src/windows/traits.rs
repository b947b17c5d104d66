use crate::windows::errors::WindowSystemError;
use crate::windows::types::{ModificationOptions, WindowId, WindowMetadata};

/// Interface to the host windowing system.
///
/// Implementations live in the platform layer of the injected worker; the
/// core only needs metadata lookup for classification and a single apply
/// primitive. `apply_options` may fail transiently while a window is still
/// settling - callers hand such windows to the retry scheduler.
pub trait WindowSystem {
    /// Query metadata for a window, or `WindowNotFound` if it is gone.
    fn window_metadata(&self, window_id: WindowId) -> Result<WindowMetadata, WindowSystemError>;

    /// Apply the given attribute set to a window.
    fn apply_options(
        &mut self,
        window_id: WindowId,
        options: &ModificationOptions,
    ) -> Result<(), WindowSystemError>;
}

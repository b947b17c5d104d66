//! Dry-run window system backend.
//!
//! Records every application instead of calling the OS. Used by tests and by
//! diagnostics runs where modifying real windows would be destructive.

use std::collections::HashMap;

use tracing::info;

use crate::windows::errors::WindowSystemError;
use crate::windows::traits::WindowSystem;
use crate::windows::types::{ModificationOptions, WindowId, WindowMetadata};

pub struct DryRunWindowSystem {
    metadata: HashMap<WindowId, WindowMetadata>,
    applied: Vec<(WindowId, ModificationOptions)>,
    /// Window ids whose next `apply_options` calls fail transiently.
    failing: HashMap<WindowId, u32>,
}

impl DryRunWindowSystem {
    pub fn new() -> Self {
        Self {
            metadata: HashMap::new(),
            applied: Vec::new(),
            failing: HashMap::new(),
        }
    }

    /// Register metadata returned for a window. Windows without registered
    /// metadata report plain standard-window metadata owned by this process.
    pub fn set_metadata(&mut self, window_id: WindowId, metadata: WindowMetadata) {
        self.metadata.insert(window_id, metadata);
    }

    /// Make the next `count` apply attempts for a window fail transiently.
    /// Pass `u32::MAX` to fail forever.
    pub fn fail_next_applies(&mut self, window_id: WindowId, count: u32) {
        self.failing.insert(window_id, count);
    }

    /// Every successful application, in order.
    pub fn applied(&self) -> &[(WindowId, ModificationOptions)] {
        &self.applied
    }

    pub fn applied_count(&self, window_id: WindowId) -> usize {
        self.applied.iter().filter(|(id, _)| *id == window_id).count()
    }
}

impl Default for DryRunWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowSystem for DryRunWindowSystem {
    fn window_metadata(&self, window_id: WindowId) -> Result<WindowMetadata, WindowSystemError> {
        Ok(self
            .metadata
            .get(&window_id)
            .cloned()
            .unwrap_or_else(|| WindowMetadata::standard(crate::process::current_pid())))
    }

    fn apply_options(
        &mut self,
        window_id: WindowId,
        options: &ModificationOptions,
    ) -> Result<(), WindowSystemError> {
        if let Some(remaining) = self.failing.get_mut(&window_id) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(WindowSystemError::NotReady { window_id });
            }
            self.failing.remove(&window_id);
        }

        info!(
            event = "core.windows.dry_run_applied",
            window_id = window_id,
            keep_above = options.keep_above,
            non_activating = options.non_activating,
            exclude_from_capture = options.exclude_from_capture,
            opacity = options.opacity,
            level = options.level
        );
        self.applied.push((window_id, options.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_records_in_order() {
        let mut system = DryRunWindowSystem::new();
        let options = ModificationOptions::default();

        system.apply_options(10, &options).unwrap();
        system.apply_options(11, &options).unwrap();

        assert_eq!(system.applied().len(), 2);
        assert_eq!(system.applied()[0].0, 10);
        assert_eq!(system.applied_count(10), 1);
        assert_eq!(system.applied_count(12), 0);
    }

    #[test]
    fn test_unregistered_window_reports_standard_metadata() {
        let system = DryRunWindowSystem::new();
        let meta = system.window_metadata(99).unwrap();
        assert_eq!(meta.level, 0);
        assert!(meta.parent_id.is_none());
    }

    #[test]
    fn test_fail_next_applies_is_transient_and_bounded() {
        let mut system = DryRunWindowSystem::new();
        let options = ModificationOptions::default();
        system.fail_next_applies(5, 2);

        let first = system.apply_options(5, &options).unwrap_err();
        assert!(first.is_transient());
        assert!(system.apply_options(5, &options).is_err());
        assert!(system.apply_options(5, &options).is_ok());
        assert_eq!(system.applied_count(5), 1);
    }
}

//! Registry service: policy layered over a backing store.
//!
//! Opening never fails outright - if the configured shared backend cannot be
//! initialized the service degrades to a process-local standalone store and
//! keeps going. All per-operation failures degrade the cross-process
//! guarantee for that call instead of propagating panics or aborts into the
//! host process.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::process;
use crate::registry::backends::{FileStore, ShmStore, StandaloneStore};
use crate::registry::errors::RegistryError;
use crate::registry::traits::RegistryStore;
use crate::registry::types::{RegistryMode, RegistrySettings, StoreBackend, WindowRecord};

/// Successful marks between opportunistic reclamation passes.
const MARKS_PER_RECLAIM: u32 = 10;

pub struct Registry {
    store: Box<dyn RegistryStore>,
    settings: RegistrySettings,
    process_id: i32,
    last_reclaim: Instant,
    marks_since_reclaim: u32,
    closed: bool,
}

impl Registry {
    /// Open the configured backing store and register this process.
    ///
    /// Falls back to standalone (local-only) operation if the shared store
    /// cannot be initialized; the caller can inspect [`Registry::mode`].
    pub fn open(settings: &RegistrySettings) -> Self {
        let process_id = process::current_pid();
        let store = Self::open_store(settings, process_id);

        info!(
            event = "core.registry.opened",
            mode = %store.mode(),
            process_id = process_id
        );

        Self {
            store,
            settings: settings.clone(),
            process_id,
            last_reclaim: Instant::now(),
            marks_since_reclaim: 0,
            closed: false,
        }
    }

    fn open_store(settings: &RegistrySettings, process_id: i32) -> Box<dyn RegistryStore> {
        let horizon_secs = settings.staleness_horizon.as_secs() as i64;
        let shared: Result<Box<dyn RegistryStore>, RegistryError> = match settings.backend {
            StoreBackend::File => {
                FileStore::attach_or_create(settings).map(|s| Box::new(s) as Box<dyn RegistryStore>)
            }
            StoreBackend::SharedMemory => {
                ShmStore::attach_or_create(settings).map(|s| Box::new(s) as Box<dyn RegistryStore>)
            }
        };

        match shared {
            Ok(mut store) => match store.register_process(process_id) {
                Ok(()) => store,
                Err(e) => {
                    warn!(
                        event = "core.registry.register_failed",
                        error = %e,
                        message = "Could not register process, falling back to standalone mode"
                    );
                    if let Err(detach_err) = store.detach() {
                        debug!(event = "core.registry.detach_failed", error = %detach_err);
                    }
                    Box::new(StandaloneStore::new(settings.capacity, horizon_secs))
                }
            },
            Err(e) => {
                warn!(
                    event = "core.registry.init_failed",
                    error = %e,
                    message = "Shared store unavailable, falling back to standalone mode"
                );
                Box::new(StandaloneStore::new(settings.capacity, horizon_secs))
            }
        }
    }

    /// Destroy the persistent state of the configured backend for a fresh
    /// coordinated run. No registry handle may be open on it.
    pub fn reset(settings: &RegistrySettings) -> Result<(), RegistryError> {
        match settings.backend {
            StoreBackend::File => FileStore::reset(settings),
            StoreBackend::SharedMemory => ShmStore::reset(settings),
        }
    }

    pub fn mode(&self) -> RegistryMode {
        self.store.mode()
    }

    /// Record a window as modified. Idempotent: re-marking refreshes the
    /// record timestamp only. Returns false when the window could not be
    /// recorded (registry full or lock unavailable) - callers proceed
    /// without the dedup guarantee for that window.
    pub fn mark_modified(&mut self, window_id: u32) -> bool {
        if window_id == 0 {
            return false;
        }

        match self.store.mark_modified(window_id, self.process_id) {
            Ok(()) => {
                self.marks_since_reclaim += 1;
                if self.marks_since_reclaim >= MARKS_PER_RECLAIM {
                    self.marks_since_reclaim = 0;
                    self.reclaim();
                }
                true
            }
            Err(e) => {
                warn!(
                    event = "core.registry.mark_failed",
                    window_id = window_id,
                    error = %e
                );
                false
            }
        }
    }

    /// Whether any cooperating process already modified the window.
    pub fn is_modified(&self, window_id: u32) -> bool {
        if window_id == 0 {
            return false;
        }
        match self.store.is_modified(window_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    event = "core.registry.query_failed",
                    window_id = window_id,
                    error = %e
                );
                false
            }
        }
    }

    /// Number of live records, for diagnostics.
    pub fn count_modified(&self) -> u32 {
        match self.store.count_modified() {
            Ok(count) => count,
            Err(e) => {
                warn!(event = "core.registry.count_failed", error = %e);
                0
            }
        }
    }

    /// Rate-limited stale-record reclamation. Returns the number of purged
    /// records (0 when the pass was skipped or failed).
    pub fn reclaim(&mut self) -> usize {
        if self.last_reclaim.elapsed() < self.settings.reclaim_interval {
            return 0;
        }
        self.last_reclaim = Instant::now();
        match self.store.reclaim(false) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(event = "core.registry.reclaim_failed", error = %e);
                0
            }
        }
    }

    /// Immediate reclamation pass, bypassing the rate limiter.
    pub fn reclaim_now(&mut self) -> Result<usize, RegistryError> {
        self.last_reclaim = Instant::now();
        self.store.reclaim(true)
    }

    /// All live records, for diagnostics.
    pub fn snapshot(&self) -> Result<Vec<WindowRecord>, RegistryError> {
        self.store.snapshot()
    }

    /// Unregister this process and release the store. Idempotent; also runs
    /// from `Drop` so every exit path detaches.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Final housekeeping pass; the interval check keeps a burst of
        // exiting processes from each paying for a full sweep.
        if let Err(e) = self.store.reclaim(false) {
            debug!(event = "core.registry.close_reclaim_failed", error = %e);
        }
        if let Err(e) = self.store.unregister_process(self.process_id) {
            warn!(event = "core.registry.unregister_failed", error = %e);
        }
        if let Err(e) = self.store.detach() {
            warn!(event = "core.registry.close_detach_failed", error = %e);
        }
        info!(event = "core.registry.closed", process_id = self.process_id);
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_settings(dir: &std::path::Path) -> RegistrySettings {
        let mut settings = RegistrySettings::file_in_dir(dir);
        settings.capacity = 16;
        settings
    }

    #[test]
    fn test_open_mark_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(&file_settings(dir.path()));
        assert_eq!(registry.mode(), RegistryMode::Created);

        assert!(!registry.is_modified(42));
        assert!(registry.mark_modified(42));
        assert!(registry.is_modified(42));
        assert_eq!(registry.count_modified(), 1);
    }

    #[test]
    fn test_window_id_zero_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(&file_settings(dir.path()));

        assert!(!registry.mark_modified(0));
        assert!(!registry.is_modified(0));
        assert_eq!(registry.count_modified(), 0);
    }

    #[test]
    fn test_mark_is_idempotent_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let settings = file_settings(dir.path());
        let mut first = Registry::open(&settings);
        let second = Registry::open(&settings);
        assert_eq!(second.mode(), RegistryMode::Joined);

        assert!(first.mark_modified(42));
        assert!(first.mark_modified(42));

        // The other process's handle observes the mark immediately.
        assert!(second.is_modified(42));
        assert_eq!(second.count_modified(), 1);
    }

    #[test]
    fn test_init_failure_falls_back_to_standalone() {
        // A data path under a file can never be created.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let mut settings = RegistrySettings::file_in_dir(&blocker.join("sub"));
        settings.capacity = 16;

        let mut registry = Registry::open(&settings);
        assert_eq!(registry.mode(), RegistryMode::Standalone);

        // Local idempotency still holds.
        assert!(registry.mark_modified(42));
        assert!(registry.is_modified(42));
        assert_eq!(registry.count_modified(), 1);
    }

    #[test]
    fn test_count_never_exceeds_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(&file_settings(dir.path()));

        for id in [1u32, 2, 3, 1, 2, 3, 1] {
            assert!(registry.mark_modified(id));
        }
        assert_eq!(registry.count_modified(), 3);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(&file_settings(dir.path()));
        registry.mark_modified(1);
        registry.close();
        registry.close();
        // Drop after close must not panic either.
    }

    #[test]
    fn test_reset_clears_state_for_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = file_settings(dir.path());
        {
            let mut registry = Registry::open(&settings);
            registry.mark_modified(42);
        }

        Registry::reset(&settings).unwrap();
        let registry = Registry::open(&settings);
        assert_eq!(registry.mode(), RegistryMode::Created);
        assert!(!registry.is_modified(42));
    }

    #[test]
    fn test_reclaim_now_reports_purged_records() {
        let dir = tempfile::tempdir().unwrap();
        let settings = file_settings(dir.path());
        let mut registry = Registry::open(&settings);
        registry.mark_modified(42);

        // Fresh records owned by a live process survive a forced pass.
        assert_eq!(registry.reclaim_now().unwrap(), 0);
        assert!(registry.is_modified(42));
    }
}

//! Process-local fallback store.
//!
//! Used when neither shared backend can be initialized. Idempotency within
//! the owning process is preserved; the cross-process guarantee is not, which
//! at worst means a window gets modified twice by two different processes -
//! visually idempotent, never a crash.

use std::collections::HashMap;

use chrono::Utc;

use crate::registry::errors::RegistryError;
use crate::registry::traits::RegistryStore;
use crate::registry::types::{RegistryMode, WindowRecord};

pub struct StandaloneStore {
    records: HashMap<u32, WindowRecord>,
    capacity: usize,
    horizon_secs: i64,
}

impl StandaloneStore {
    pub fn new(capacity: usize, horizon_secs: i64) -> Self {
        Self {
            records: HashMap::new(),
            capacity,
            horizon_secs,
        }
    }
}

impl RegistryStore for StandaloneStore {
    fn mode(&self) -> RegistryMode {
        RegistryMode::Standalone
    }

    fn mark_modified(&mut self, window_id: u32, process_id: i32) -> Result<(), RegistryError> {
        debug_assert_ne!(window_id, 0);
        let now = Utc::now().timestamp();

        if let Some(record) = self.records.get_mut(&window_id) {
            record.last_modified_at = now;
            return Ok(());
        }

        if self.records.len() >= self.capacity {
            let _ = self.reclaim(true);
            if self.records.len() >= self.capacity {
                return Err(RegistryError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
        }

        self.records.insert(
            window_id,
            WindowRecord {
                window_id,
                process_id,
                last_modified_at: now,
            },
        );
        Ok(())
    }

    fn is_modified(&self, window_id: u32) -> Result<bool, RegistryError> {
        Ok(self.records.contains_key(&window_id))
    }

    fn count_modified(&self) -> Result<u32, RegistryError> {
        Ok(self.records.len() as u32)
    }

    fn register_process(&mut self, _process_id: i32) -> Result<(), RegistryError> {
        Ok(())
    }

    fn unregister_process(&mut self, _process_id: i32) -> Result<(), RegistryError> {
        Ok(())
    }

    fn reclaim(&mut self, _force: bool) -> Result<usize, RegistryError> {
        let now = Utc::now().timestamp();
        let before = self.records.len();
        let horizon = self.horizon_secs;
        self.records
            .retain(|_, record| now - record.last_modified_at <= horizon);
        Ok(before - self.records.len())
    }

    fn snapshot(&self) -> Result<Vec<WindowRecord>, RegistryError> {
        let mut records: Vec<WindowRecord> = self.records.values().copied().collect();
        records.sort_by_key(|r| r.window_id);
        Ok(records)
    }

    fn detach(&mut self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_idempotency() {
        let mut store = StandaloneStore::new(16, 3600);
        assert_eq!(store.mode(), RegistryMode::Standalone);

        store.mark_modified(42, 1).unwrap();
        store.mark_modified(42, 1).unwrap();
        assert!(store.is_modified(42).unwrap());
        assert_eq!(store.count_modified().unwrap(), 1);
    }

    #[test]
    fn test_capacity_fails_cleanly() {
        let mut store = StandaloneStore::new(4, 3600);
        for id in 1..=4 {
            store.mark_modified(id, 1).unwrap();
        }
        let err = store.mark_modified(5, 1).unwrap_err();
        assert!(matches!(err, RegistryError::CapacityExceeded { capacity: 4 }));
        for id in 1..=4 {
            assert!(store.is_modified(id).unwrap());
        }
    }

    #[test]
    fn test_reclaim_purges_past_horizon() {
        let mut store = StandaloneStore::new(16, 3600);
        store.mark_modified(42, 1).unwrap();
        store
            .records
            .get_mut(&42)
            .unwrap()
            .last_modified_at -= 7200;

        assert_eq!(store.reclaim(true).unwrap(), 1);
        assert!(!store.is_modified(42).unwrap());
    }
}

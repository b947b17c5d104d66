//! File-backed registry store.
//!
//! A flat file of fixed-size little-endian records guarded by advisory file
//! locks: shared for reads, exclusive for writes. The lock lives in a
//! separate file so that compaction can atomically replace the data file
//! without invalidating anyone's lock. The first record (`window_id == 0`)
//! is a sentinel header and survives every compaction.
//!
//! Liveness of record owners is probed with no lock held; the exclusive lock
//! only ever covers in-memory record manipulation plus the rewrite itself.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::thread;

use chrono::Utc;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, info};

use crate::process;
use crate::registry::errors::RegistryError;
use crate::registry::traits::RegistryStore;
use crate::registry::types::{
    EXCLUSIVE_LOCK_ATTEMPTS, LOCK_RETRY_BASE, RegistryMode, RegistrySettings,
    SHARED_LOCK_ATTEMPTS, WindowRecord,
};

/// On-disk record size: u32 window id, i32 process id, i64 timestamp.
const RECORD_SIZE: usize = 16;

fn encode_record(record: &WindowRecord) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..4].copy_from_slice(&record.window_id.to_le_bytes());
    buf[4..8].copy_from_slice(&record.process_id.to_le_bytes());
    buf[8..16].copy_from_slice(&record.last_modified_at.to_le_bytes());
    buf
}

fn decode_record(buf: &[u8]) -> WindowRecord {
    WindowRecord {
        window_id: u32::from_le_bytes(buf[0..4].try_into().expect("record slice length")),
        process_id: i32::from_le_bytes(buf[4..8].try_into().expect("record slice length")),
        last_modified_at: i64::from_le_bytes(buf[8..16].try_into().expect("record slice length")),
    }
}

pub struct FileStore {
    data_path: PathBuf,
    lock_path: PathBuf,
    capacity: usize,
    horizon_secs: i64,
    reclaim_interval_secs: i64,
    mode: RegistryMode,
}

impl FileStore {
    /// Open the store, creating and initializing the data file if this is
    /// the first process to arrive.
    pub fn attach_or_create(settings: &RegistrySettings) -> Result<Self, RegistryError> {
        if let Some(parent) = settings.data_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store = Self {
            data_path: settings.data_path.clone(),
            lock_path: settings.lock_path.clone(),
            capacity: settings.capacity,
            horizon_secs: settings.staleness_horizon.as_secs() as i64,
            reclaim_interval_secs: settings.reclaim_interval.as_secs() as i64,
            mode: RegistryMode::Joined,
        };

        let _lock = store.acquire_exclusive("attach")?;
        let mut file = store.open_data()?;
        let len = file.metadata()?.len();

        if len == 0 {
            // Fresh store: write the sentinel header record.
            let sentinel = WindowRecord {
                window_id: 0,
                process_id: 0,
                last_modified_at: Utc::now().timestamp(),
            };
            file.write_all(&encode_record(&sentinel))?;
            file.flush()?;
            store.mode = RegistryMode::Created;
        } else if len as usize > (store.capacity + 1) * RECORD_SIZE {
            // Oversized file left behind by an earlier run with a larger
            // capacity, or by torn growth. Compact on age alone; owner
            // liveness is probed by regular reclamation later.
            let removed = store.compact_locked(&mut file, &HashSet::new())?;
            info!(
                event = "core.registry.attach_compacted",
                removed = removed,
                path = %store.data_path.display()
            );
        }

        info!(
            event = "core.registry.file_store_opened",
            mode = %store.mode,
            path = %store.data_path.display()
        );
        Ok(store)
    }

    /// Remove the store's on-disk state for a fresh coordinated run.
    pub fn reset(settings: &RegistrySettings) -> Result<(), RegistryError> {
        for path in [&settings.data_path, &settings.lock_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RegistryError::IoError { source: e }),
            }
        }
        Ok(())
    }

    fn open_data(&self) -> Result<File, RegistryError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.data_path)?;
        Ok(file)
    }

    /// Bounded-retry advisory lock acquisition on the lock file.
    fn acquire(
        &self,
        arg: FlockArg,
        attempts: u32,
        operation: &'static str,
    ) -> Result<Flock<File>, RegistryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;

        for attempt in 1..=attempts {
            match Flock::lock(file, arg) {
                Ok(lock) => return Ok(lock),
                Err((returned, _errno)) => {
                    file = returned;
                    if attempt < attempts {
                        thread::sleep(LOCK_RETRY_BASE * attempt);
                    }
                }
            }
        }
        Err(RegistryError::LockTimeout {
            operation,
            attempts,
        })
    }

    fn acquire_shared(&self, operation: &'static str) -> Result<Flock<File>, RegistryError> {
        self.acquire(FlockArg::LockSharedNonblock, SHARED_LOCK_ATTEMPTS, operation)
    }

    fn acquire_exclusive(&self, operation: &'static str) -> Result<Flock<File>, RegistryError> {
        self.acquire(
            FlockArg::LockExclusiveNonblock,
            EXCLUSIVE_LOCK_ATTEMPTS,
            operation,
        )
    }

    /// Read every record in the data file. A trailing partial record (torn
    /// write of a crashed peer) is dropped.
    fn read_records(&self, file: &mut File) -> Result<Vec<WindowRecord>, RegistryError> {
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let records: Vec<WindowRecord> =
            bytes.chunks_exact(RECORD_SIZE).map(decode_record).collect();
        if bytes.len() % RECORD_SIZE != 0 {
            debug!(
                event = "core.registry.torn_record_dropped",
                trailing_bytes = bytes.len() % RECORD_SIZE
            );
        }
        Ok(records)
    }

    fn live_count(records: &[WindowRecord]) -> usize {
        records.iter().filter(|r| r.window_id != 0).count()
    }

    /// Read every record under a briefly-held shared lock.
    fn snapshot_records(&self) -> Result<Vec<WindowRecord>, RegistryError> {
        let _lock = self.acquire_shared("snapshot")?;
        let mut file = self.open_data()?;
        self.read_records(&mut file)
    }

    /// When the last compaction ran, per the sentinel timestamp.
    fn last_pass_at(records: &[WindowRecord]) -> i64 {
        records
            .first()
            .filter(|r| r.window_id == 0)
            .map(|r| r.last_modified_at)
            .unwrap_or(0)
    }

    /// Probe owner liveness with no lock held. The current process is
    /// trivially alive and skipped.
    fn dead_owners(records: &[WindowRecord]) -> HashSet<i32> {
        let self_pid = process::current_pid();
        let mut seen = HashSet::new();
        let mut dead = HashSet::new();
        for record in records {
            let pid = record.process_id;
            if record.window_id == 0 || pid == self_pid || !seen.insert(pid) {
                continue;
            }
            if !process::is_process_running(pid) {
                dead.insert(pid);
            }
        }
        dead
    }

    /// Rewrite the data file keeping the sentinel plus every fresh record
    /// with a live owner. Caller holds the exclusive lock. The sentinel's
    /// timestamp is refreshed to `now` so every handle, in every process,
    /// sees when the last compaction ran.
    fn compact_locked(
        &self,
        file: &mut File,
        dead_owners: &HashSet<i32>,
    ) -> Result<usize, RegistryError> {
        let records = self.read_records(file)?;
        let now = Utc::now().timestamp();

        let sentinel = WindowRecord {
            window_id: 0,
            process_id: records
                .first()
                .filter(|r| r.window_id == 0)
                .map(|r| r.process_id)
                .unwrap_or(0),
            last_modified_at: now,
        };

        let mut kept = Vec::with_capacity(records.len());
        let mut removed = 0usize;
        for record in records.iter().skip(1) {
            if record.window_id == 0 {
                continue;
            }
            if now - record.last_modified_at > self.horizon_secs
                || dead_owners.contains(&record.process_id)
            {
                removed += 1;
                continue;
            }
            kept.push(*record);
        }

        let temp_path = self.data_path.with_extension("dat.tmp");
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&encode_record(&sentinel))?;
        for record in &kept {
            temp.write_all(&encode_record(record))?;
        }
        temp.flush()?;

        if let Err(e) = fs::rename(&temp_path, &self.data_path) {
            if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                debug!(
                    event = "core.registry.temp_file_cleanup_failed",
                    error = %cleanup_err
                );
            }
            return Err(RegistryError::IoError { source: e });
        }

        Ok(removed)
    }
}

impl RegistryStore for FileStore {
    fn mode(&self) -> RegistryMode {
        self.mode
    }

    fn mark_modified(&mut self, window_id: u32, process_id: i32) -> Result<(), RegistryError> {
        debug_assert_ne!(window_id, 0);

        let now = Utc::now().timestamp();
        {
            let _lock = self.acquire_exclusive("mark_modified")?;
            let mut file = self.open_data()?;
            let records = self.read_records(&mut file)?;

            if let Some(index) = records.iter().position(|r| r.window_id == window_id) {
                // Already registered: refresh the timestamp in place.
                file.seek(SeekFrom::Start((index * RECORD_SIZE + 8) as u64))?;
                file.write_all(&now.to_le_bytes())?;
                return Ok(());
            }

            if Self::live_count(&records) < self.capacity {
                file.seek(SeekFrom::End(0))?;
                file.write_all(&encode_record(&WindowRecord {
                    window_id,
                    process_id,
                    last_modified_at: now,
                }))?;
                return Ok(());
            }
        }

        // At capacity: reclaim once, then retry the insert once. Liveness is
        // probed between the two lock acquisitions, never under either.
        let dead = Self::dead_owners(&self.snapshot_records()?);

        let _lock = self.acquire_exclusive("mark_modified")?;
        let mut file = self.open_data()?;
        let removed = self.compact_locked(&mut file, &dead)?;
        debug!(
            event = "core.registry.capacity_reclaim",
            removed = removed,
            window_id = window_id
        );

        let mut file = self.open_data()?;
        let records = self.read_records(&mut file)?;
        if let Some(index) = records.iter().position(|r| r.window_id == window_id) {
            // Another process registered the window while we were probing.
            file.seek(SeekFrom::Start((index * RECORD_SIZE + 8) as u64))?;
            file.write_all(&now.to_le_bytes())?;
            return Ok(());
        }
        if Self::live_count(&records) < self.capacity {
            file.seek(SeekFrom::End(0))?;
            file.write_all(&encode_record(&WindowRecord {
                window_id,
                process_id,
                last_modified_at: now,
            }))?;
            return Ok(());
        }

        Err(RegistryError::CapacityExceeded {
            capacity: self.capacity,
        })
    }

    fn is_modified(&self, window_id: u32) -> Result<bool, RegistryError> {
        if window_id == 0 {
            return Ok(false);
        }
        let _lock = self.acquire_shared("is_modified")?;
        let mut file = self.open_data()?;
        let records = self.read_records(&mut file)?;
        Ok(records.iter().any(|r| r.window_id == window_id))
    }

    fn count_modified(&self) -> Result<u32, RegistryError> {
        let _lock = self.acquire_shared("count_modified")?;
        let mut file = self.open_data()?;
        let records = self.read_records(&mut file)?;
        Ok(Self::live_count(&records) as u32)
    }

    fn register_process(&mut self, _process_id: i32) -> Result<(), RegistryError> {
        // The on-disk layout carries no live-process table; staleness is
        // decided by liveness probe plus the age horizon instead.
        Ok(())
    }

    fn unregister_process(&mut self, _process_id: i32) -> Result<(), RegistryError> {
        Ok(())
    }

    fn reclaim(&mut self, force: bool) -> Result<usize, RegistryError> {
        let records = self.snapshot_records()?;
        if !force
            && Utc::now().timestamp() - Self::last_pass_at(&records) < self.reclaim_interval_secs
        {
            return Ok(0);
        }
        let dead = Self::dead_owners(&records);

        let _lock = self.acquire_exclusive("reclaim")?;
        let mut file = self.open_data()?;
        let removed = self.compact_locked(&mut file, &dead)?;
        if removed > 0 {
            info!(event = "core.registry.reclaimed", removed = removed);
        }
        Ok(removed)
    }

    fn snapshot(&self) -> Result<Vec<WindowRecord>, RegistryError> {
        let records = self.snapshot_records()?;
        Ok(records.into_iter().filter(|r| r.window_id != 0).collect())
    }

    fn detach(&mut self) -> Result<(), RegistryError> {
        // The file store persists until explicitly reset.
        Ok(())
    }
}

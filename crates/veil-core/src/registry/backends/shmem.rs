//! Shared-memory registry store.
//!
//! One POSIX shared-memory segment holds a process-shared pthread mutex, the
//! live-process table and the record array. The creating process (the
//! `O_EXCL` winner) initializes the segment and then publishes a ready
//! marker; joiners wait briefly on the marker before touching anything else.
//!
//! Every acquisition is a bounded `pthread_mutex_trylock` loop. A peer that
//! dies inside the critical section therefore surfaces as `LockTimeout` on
//! our side, never as a deadlock; its records are recovered later by
//! reclamation.

use std::fs::File;
use std::mem;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use chrono::Utc;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use tracing::{debug, info, warn};

use crate::process;
use crate::registry::errors::RegistryError;
use crate::registry::traits::RegistryStore;
use crate::registry::types::{
    EXCLUSIVE_LOCK_ATTEMPTS, LOCK_RETRY_BASE, RegistryMode, RegistrySettings, SHM_MAX_PROCESSES,
    SHM_MAX_RECORDS, WindowRecord,
};

const SHM_MAGIC: u32 = 0x5645_494C;

/// How long a joiner waits for the creator to publish the ready marker.
const JOIN_WAIT_ATTEMPTS: u32 = 100;

#[repr(C)]
#[derive(Clone, Copy)]
struct ShmRecord {
    window_id: u32,
    process_id: i32,
    last_modified_at: i64,
    valid: u32,
}

#[repr(C)]
struct ShmSegment {
    lock: libc::pthread_mutex_t,
    magic: AtomicU32,
    record_count: u32,
    process_count: u32,
    last_reclaim_at: i64,
    processes: [i32; SHM_MAX_PROCESSES],
    records: [ShmRecord; SHM_MAX_RECORDS],
}

/// Releases the process-shared mutex on drop.
struct SegmentGuard {
    lock: *mut libc::pthread_mutex_t,
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_unlock(self.lock);
        }
    }
}

pub struct ShmStore {
    name: String,
    seg: NonNull<ShmSegment>,
    mode: RegistryMode,
    horizon_secs: i64,
    reclaim_interval_secs: i64,
    detached: bool,
}

// The segment pointer is only dereferenced under the process-shared mutex,
// and the store itself has a single owner.
unsafe impl Send for ShmStore {}

impl ShmStore {
    pub fn attach_or_create(settings: &RegistrySettings) -> Result<Self, RegistryError> {
        let name = settings.shm_name.clone();
        let size = mem::size_of::<ShmSegment>();
        let length = NonZeroUsize::new(size).expect("segment size is nonzero");

        let create_flags = OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL;
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        let (fd, created) = match shm_open(name.as_str(), create_flags, mode) {
            Ok(fd) => (fd, true),
            Err(Errno::EEXIST) => {
                let fd = shm_open(name.as_str(), OFlag::O_RDWR, Mode::empty()).map_err(|e| {
                    RegistryError::InitializationFailed {
                        message: format!("shm_open('{}') failed: {}", name, e),
                    }
                })?;
                (fd, false)
            }
            Err(e) => {
                return Err(RegistryError::InitializationFailed {
                    message: format!("shm_open('{}') failed: {}", name, e),
                });
            }
        };

        let file = File::from(fd);
        if created {
            if let Err(e) = nix::unistd::ftruncate(&file, size as libc::off_t) {
                let _ = shm_unlink(name.as_str());
                return Err(RegistryError::InitializationFailed {
                    message: format!("ftruncate of segment '{}' failed: {}", name, e),
                });
            }
        } else {
            // The creator may still be between shm_open and ftruncate; wait
            // for the segment to reach its full size before mapping.
            let mut sized = false;
            for _ in 0..JOIN_WAIT_ATTEMPTS {
                match file.metadata() {
                    Ok(stat) if stat.len() as usize >= size => {
                        sized = true;
                        break;
                    }
                    Ok(_) => thread::sleep(LOCK_RETRY_BASE),
                    Err(e) => {
                        return Err(RegistryError::InitializationFailed {
                            message: format!("stat of segment '{}' failed: {}", name, e),
                        });
                    }
                }
            }
            if !sized {
                return Err(RegistryError::InitializationFailed {
                    message: format!("segment '{}' never reached its full size", name),
                });
            }
        }

        let seg = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(|e| {
            if created {
                let _ = shm_unlink(name.as_str());
            }
            RegistryError::InitializationFailed {
                message: format!("mmap of segment '{}' failed: {}", name, e),
            }
        })?
        .cast::<ShmSegment>();
        drop(file);

        if created {
            if let Err(e) = unsafe { Self::init_segment(seg) } {
                unsafe {
                    let _ = munmap(seg.cast(), size);
                }
                let _ = shm_unlink(name.as_str());
                return Err(e);
            }
        } else {
            // Wait for the creator to finish initializing.
            let magic = unsafe { &seg.as_ref().magic };
            let mut ready = false;
            for _ in 0..JOIN_WAIT_ATTEMPTS {
                if magic.load(Ordering::Acquire) == SHM_MAGIC {
                    ready = true;
                    break;
                }
                thread::sleep(LOCK_RETRY_BASE);
            }
            if !ready {
                unsafe {
                    let _ = munmap(seg.cast(), size);
                }
                return Err(RegistryError::InitializationFailed {
                    message: format!("segment '{}' never became ready", name),
                });
            }
        }

        let store = Self {
            name,
            seg,
            mode: if created {
                RegistryMode::Created
            } else {
                RegistryMode::Joined
            },
            horizon_secs: settings.staleness_horizon.as_secs() as i64,
            reclaim_interval_secs: settings.reclaim_interval.as_secs() as i64,
            detached: false,
        };
        info!(
            event = "core.registry.shm_store_opened",
            mode = %store.mode,
            name = %store.name
        );
        Ok(store)
    }

    /// Remove the named segment, for a fresh coordinated run.
    pub fn reset(settings: &RegistrySettings) -> Result<(), RegistryError> {
        match shm_unlink(settings.shm_name.as_str()) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(e) => Err(RegistryError::InitializationFailed {
                message: format!("shm_unlink('{}') failed: {}", settings.shm_name, e),
            }),
        }
    }

    /// Initialize a freshly created segment: process-shared mutex first,
    /// ready marker last.
    unsafe fn init_segment(seg: NonNull<ShmSegment>) -> Result<(), RegistryError> {
        let seg = seg.as_ptr();
        unsafe {
            let mut attr = mem::MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            if libc::pthread_mutexattr_init(attr.as_mut_ptr()) != 0 {
                return Err(RegistryError::InitializationFailed {
                    message: "pthread_mutexattr_init failed".to_string(),
                });
            }
            if libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED)
                != 0
            {
                libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
                return Err(RegistryError::InitializationFailed {
                    message: "pthread_mutexattr_setpshared failed".to_string(),
                });
            }
            let rc = libc::pthread_mutex_init(&raw mut (*seg).lock, attr.as_ptr());
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            if rc != 0 {
                return Err(RegistryError::InitializationFailed {
                    message: "pthread_mutex_init failed".to_string(),
                });
            }

            (*seg).record_count = 0;
            (*seg).process_count = 0;
            (*seg).last_reclaim_at = Utc::now().timestamp();
            (*seg).magic.store(SHM_MAGIC, Ordering::Release);
        }
        Ok(())
    }

    /// Bounded trylock acquisition of the process-shared mutex.
    fn acquire(&self, operation: &'static str) -> Result<SegmentGuard, RegistryError> {
        let lock = unsafe { &raw mut (*self.seg.as_ptr()).lock };
        for attempt in 1..=EXCLUSIVE_LOCK_ATTEMPTS {
            if unsafe { libc::pthread_mutex_trylock(lock) } == 0 {
                return Ok(SegmentGuard { lock });
            }
            if attempt < EXCLUSIVE_LOCK_ATTEMPTS {
                thread::sleep(LOCK_RETRY_BASE * attempt);
            }
        }
        Err(RegistryError::LockTimeout {
            operation,
            attempts: EXCLUSIVE_LOCK_ATTEMPTS,
        })
    }

    fn remove_process_locked(seg: &mut ShmSegment, process_id: i32) -> bool {
        let count = (seg.process_count as usize).min(SHM_MAX_PROCESSES);
        if let Some(index) = seg.processes[..count].iter().position(|&p| p == process_id) {
            seg.processes.copy_within(index + 1..count, index);
            seg.process_count -= 1;
            true
        } else {
            false
        }
    }

    /// Invalidate stale records and compact the array. Caller holds the lock.
    fn reclaim_locked(seg: &mut ShmSegment, now: i64, horizon_secs: i64) -> usize {
        let record_count = (seg.record_count as usize).min(SHM_MAX_RECORDS);
        let process_count = (seg.process_count as usize).min(SHM_MAX_PROCESSES);

        let mut removed = 0usize;
        for i in 0..record_count {
            let record = &mut seg.records[i];
            if record.valid == 0 {
                continue;
            }
            let owner_live = seg.processes[..process_count].contains(&record.process_id);
            if !owner_live || now - record.last_modified_at > horizon_secs {
                record.valid = 0;
                removed += 1;
            }
        }

        // Compact so scans stay bounded by the live count.
        let mut write_index = 0usize;
        for i in 0..record_count {
            if seg.records[i].valid != 0 {
                if i != write_index {
                    let moved = seg.records[i];
                    seg.records[write_index] = moved;
                    seg.records[i].valid = 0;
                }
                write_index += 1;
            }
        }
        seg.record_count = write_index as u32;
        seg.last_reclaim_at = now;

        removed
    }
}

impl RegistryStore for ShmStore {
    fn mode(&self) -> RegistryMode {
        self.mode
    }

    fn mark_modified(&mut self, window_id: u32, process_id: i32) -> Result<(), RegistryError> {
        debug_assert_ne!(window_id, 0);

        let now = Utc::now().timestamp();
        let _guard = self.acquire("mark_modified")?;
        let seg = unsafe { &mut *self.seg.as_ptr() };
        let count = (seg.record_count as usize).min(SHM_MAX_RECORDS);

        // Search existing under the same lock that covers the insert.
        for i in 0..count {
            let record = &mut seg.records[i];
            if record.valid != 0 && record.window_id == window_id {
                record.last_modified_at = now;
                return Ok(());
            }
        }

        let mut slot = (0..count).find(|&i| seg.records[i].valid == 0);
        if slot.is_none() {
            if count < SHM_MAX_RECORDS {
                slot = Some(count);
                seg.record_count += 1;
            } else {
                // Full: reclaim once, then retry the insert once.
                Self::reclaim_locked(seg, now, self.horizon_secs);
                let compacted = (seg.record_count as usize).min(SHM_MAX_RECORDS);
                if compacted < SHM_MAX_RECORDS {
                    slot = Some(compacted);
                    seg.record_count += 1;
                } else {
                    return Err(RegistryError::CapacityExceeded {
                        capacity: SHM_MAX_RECORDS,
                    });
                }
            }
        }

        let index = slot.expect("slot resolved above");
        seg.records[index] = ShmRecord {
            window_id,
            process_id,
            last_modified_at: now,
            valid: 1,
        };
        Ok(())
    }

    fn is_modified(&self, window_id: u32) -> Result<bool, RegistryError> {
        if window_id == 0 {
            return Ok(false);
        }
        let _guard = self.acquire("is_modified")?;
        let seg = unsafe { self.seg.as_ref() };
        let count = (seg.record_count as usize).min(SHM_MAX_RECORDS);
        Ok(seg.records[..count]
            .iter()
            .any(|r| r.valid != 0 && r.window_id == window_id))
    }

    fn count_modified(&self) -> Result<u32, RegistryError> {
        let _guard = self.acquire("count_modified")?;
        let seg = unsafe { self.seg.as_ref() };
        let count = (seg.record_count as usize).min(SHM_MAX_RECORDS);
        Ok(seg.records[..count].iter().filter(|r| r.valid != 0).count() as u32)
    }

    fn register_process(&mut self, process_id: i32) -> Result<(), RegistryError> {
        let result = {
            let _guard = self.acquire("register_process")?;
            let seg = unsafe { &mut *self.seg.as_ptr() };
            let count = (seg.process_count as usize).min(SHM_MAX_PROCESSES);
            if seg.processes[..count].contains(&process_id) {
                Ok(())
            } else if count >= SHM_MAX_PROCESSES {
                Err(RegistryError::CapacityExceeded {
                    capacity: SHM_MAX_PROCESSES,
                })
            } else {
                seg.processes[count] = process_id;
                seg.process_count += 1;
                Ok(())
            }
        };
        if result.is_ok() {
            debug!(
                event = "core.registry.process_registered",
                process_id = process_id
            );
        }
        result
    }

    fn unregister_process(&mut self, process_id: i32) -> Result<(), RegistryError> {
        let removed = {
            let _guard = self.acquire("unregister_process")?;
            let seg = unsafe { &mut *self.seg.as_ptr() };
            Self::remove_process_locked(seg, process_id)
        };
        if removed {
            debug!(
                event = "core.registry.process_unregistered",
                process_id = process_id
            );
        }
        Ok(())
    }

    fn reclaim(&mut self, force: bool) -> Result<usize, RegistryError> {
        // Snapshot the process table, then probe liveness with no lock held.
        let pids: Vec<i32> = {
            let _guard = self.acquire("reclaim")?;
            let seg = unsafe { self.seg.as_ref() };
            let count = (seg.process_count as usize).min(SHM_MAX_PROCESSES);
            seg.processes[..count].to_vec()
        };

        let self_pid = process::current_pid();
        let dead: Vec<i32> = pids
            .into_iter()
            .filter(|&pid| pid != self_pid && !process::is_process_running(pid))
            .collect();

        let now = Utc::now().timestamp();
        let removed = {
            let _guard = self.acquire("reclaim")?;
            let seg = unsafe { &mut *self.seg.as_ptr() };
            if !force && now - seg.last_reclaim_at < self.reclaim_interval_secs {
                return Ok(0);
            }
            for pid in &dead {
                Self::remove_process_locked(seg, *pid);
            }
            Self::reclaim_locked(seg, now, self.horizon_secs)
        };

        if removed > 0 {
            info!(
                event = "core.registry.reclaimed",
                removed = removed,
                dead_processes = dead.len()
            );
        }
        Ok(removed)
    }

    fn snapshot(&self) -> Result<Vec<WindowRecord>, RegistryError> {
        let _guard = self.acquire("snapshot")?;
        let seg = unsafe { self.seg.as_ref() };
        let count = (seg.record_count as usize).min(SHM_MAX_RECORDS);
        Ok(seg.records[..count]
            .iter()
            .filter(|r| r.valid != 0)
            .map(|r| WindowRecord {
                window_id: r.window_id,
                process_id: r.process_id,
                last_modified_at: r.last_modified_at,
            })
            .collect())
    }

    fn detach(&mut self) -> Result<(), RegistryError> {
        if self.detached {
            return Ok(());
        }

        // Best effort: read the remaining process count so the last process
        // out can unlink the segment. On lock timeout we still unmap, but
        // leave the segment for the survivors.
        let remaining = match self.acquire("detach") {
            Ok(_guard) => unsafe { self.seg.as_ref() }.process_count,
            Err(e) => {
                warn!(event = "core.registry.detach_lock_failed", error = %e);
                u32::MAX
            }
        };

        self.detached = true;
        unsafe {
            if let Err(e) = munmap(self.seg.cast(), mem::size_of::<ShmSegment>()) {
                return Err(RegistryError::InitializationFailed {
                    message: format!("munmap of segment '{}' failed: {}", self.name, e),
                });
            }
        }

        if remaining == 0 {
            let _ = shm_unlink(self.name.as_str());
            info!(event = "core.registry.shm_unlinked", name = %self.name);
        }
        Ok(())
    }
}

impl Drop for ShmStore {
    fn drop(&mut self) {
        if !self.detached
            && let Err(e) = self.detach()
        {
            warn!(event = "core.registry.detach_failed", error = %e);
        }
    }
}

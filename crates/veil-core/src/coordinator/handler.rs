use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{VeilConfig, defaults};
use crate::registry::Registry;
use crate::retry::{RetryPolicy, RetryQueue};
use crate::tracker::WindowTracker;
use crate::tracker::types::WindowClass;
use crate::windows::traits::WindowSystem;
use crate::windows::types::{ModificationOptions, WindowEvent, WindowEventKind, WindowId};

/// Counters from one sweep pass, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Due retry entries that were re-attempted.
    pub attempted: usize,
    /// Windows successfully modified during this sweep.
    pub modified: usize,
    /// Idle tracker entries dropped.
    pub pruned: usize,
}

/// Outcome of one modification attempt.
enum Attempt {
    /// The window was modified and recorded.
    Applied,
    /// Nothing left to do for this window (already modified, ineligible,
    /// or gone).
    Settled,
    /// Not modifiable yet; a retry is scheduled.
    Deferred,
}

/// Drives one process's share of the coordinated run.
///
/// Owns the readiness tracker, the retry queue and this process's registry
/// handle. The host delivers lifecycle events through [`handle_event`] and
/// calls [`sweep`] on a fixed cadence from the same worker; no internal
/// locking is needed.
///
/// [`handle_event`]: Coordinator::handle_event
/// [`sweep`]: Coordinator::sweep
pub struct Coordinator<W: WindowSystem> {
    windows: W,
    registry: Registry,
    tracker: WindowTracker,
    retries: RetryQueue,
    options: ModificationOptions,
}

impl<W: WindowSystem> Coordinator<W> {
    pub fn new(
        windows: W,
        registry: Registry,
        options: ModificationOptions,
        policy: RetryPolicy,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            windows,
            registry,
            tracker: WindowTracker::new(idle_timeout),
            retries: RetryQueue::new(policy),
            options,
        }
    }

    /// Build a coordinator from the merged file config.
    pub fn from_config(windows: W, registry: Registry, config: &VeilConfig) -> Self {
        let idle_timeout = Duration::from_secs(
            config
                .tracker
                .idle_timeout_secs
                .unwrap_or(defaults::DEFAULT_IDLE_TIMEOUT_SECS),
        );
        Self::new(
            windows,
            registry,
            config.options.clone().unwrap_or_default(),
            RetryPolicy::from_config(&config.retry),
            idle_timeout,
        )
    }

    /// Fold one lifecycle notification in; attempt modification if the
    /// window is ready.
    pub fn handle_event(&mut self, event: WindowEvent) {
        if event.kind == WindowEventKind::Destroyed {
            self.tracker.observe(event.window_id, event.kind);
            self.retries.remove(event.window_id);
            return;
        }
        if self.tracker.observe(event.window_id, event.kind) {
            self.attempt(event.window_id, Instant::now());
        }
    }

    /// Re-attempt due retries and prune idle tracker state.
    ///
    /// Driven by the owning worker on a fixed cadence; each window's retry
    /// is independent, so one stubborn window never blocks the rest.
    pub fn sweep(&mut self, now: Instant) -> SweepStats {
        let mut stats = SweepStats::default();
        for window_id in self.retries.due(now) {
            stats.attempted += 1;
            if matches!(self.attempt(window_id, now), Attempt::Applied) {
                stats.modified += 1;
            }
        }
        stats.pruned = self.tracker.prune_idle(now);
        self.registry.reclaim();

        if stats.attempted > 0 || stats.pruned > 0 {
            debug!(
                event = "core.coordinator.sweep_completed",
                attempted = stats.attempted,
                modified = stats.modified,
                pruned = stats.pruned
            );
        }
        stats
    }

    fn attempt(&mut self, window_id: WindowId, now: Instant) -> Attempt {
        if self.retries.is_abandoned(window_id) {
            return Attempt::Settled;
        }
        if !self.tracker.is_tracked(window_id) {
            self.retries.remove(window_id);
            return Attempt::Settled;
        }
        if !self.tracker.is_ready(window_id) {
            self.retries.schedule(window_id, now);
            return Attempt::Deferred;
        }

        match self.tracker.classification(window_id, &self.windows) {
            WindowClass::Unknown => {
                // Metadata was not available; classify on a later attempt.
                self.retries.schedule(window_id, now);
                return Attempt::Deferred;
            }
            class if !class.is_eligible() => {
                debug!(
                    event = "core.coordinator.window_ineligible",
                    window_id = window_id,
                    class = ?class
                );
                self.retries.resolve(window_id);
                return Attempt::Settled;
            }
            _ => {}
        }

        if self.registry.is_modified(window_id) {
            debug!(
                event = "core.coordinator.window_already_modified",
                window_id = window_id
            );
            self.retries.resolve(window_id);
            return Attempt::Settled;
        }

        match self.windows.apply_options(window_id, &self.options) {
            Ok(()) => {
                self.registry.mark_modified(window_id);
                self.retries.resolve(window_id);
                info!(
                    event = "core.coordinator.window_modified",
                    window_id = window_id
                );
                Attempt::Applied
            }
            Err(e) if e.is_transient() => {
                debug!(
                    event = "core.coordinator.apply_deferred",
                    window_id = window_id,
                    error = %e
                );
                self.retries.schedule(window_id, now);
                Attempt::Deferred
            }
            Err(e) => {
                warn!(
                    event = "core.coordinator.window_vanished",
                    window_id = window_id,
                    error = %e
                );
                self.tracker.remove(window_id);
                self.retries.remove(window_id);
                Attempt::Settled
            }
        }
    }

    pub fn windows(&self) -> &W {
        &self.windows
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tracked_windows(&self) -> usize {
        self.tracker.tracked_count()
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.pending_count()
    }
}

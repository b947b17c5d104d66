use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, warn};

use crate::retry::types::{RetryEntry, RetryPolicy};
use crate::windows::types::WindowId;

/// Per-process queue of windows awaiting a re-attempt.
pub struct RetryQueue {
    entries: HashMap<WindowId, RetryEntry>,
    abandoned: HashSet<WindowId>,
    policy: RetryPolicy,
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            abandoned: HashSet::new(),
            policy,
        }
    }

    /// Record a failed or premature attempt and schedule the next one.
    ///
    /// Returns false when the window has exhausted its attempts; it is then
    /// abandoned (logged once) and never scheduled again.
    pub fn schedule(&mut self, window_id: WindowId, now: Instant) -> bool {
        if self.abandoned.contains(&window_id) {
            return false;
        }

        let attempts = self
            .entries
            .get(&window_id)
            .map(|entry| entry.attempts)
            .unwrap_or(0)
            + 1;

        if attempts > self.policy.max_attempts {
            self.entries.remove(&window_id);
            self.abandoned.insert(window_id);
            warn!(
                event = "core.retry.window_abandoned",
                window_id = window_id,
                attempts = attempts - 1
            );
            return false;
        }

        let next_attempt_at = now + self.policy.backoff.delay(attempts);
        debug!(
            event = "core.retry.scheduled",
            window_id = window_id,
            attempts = attempts
        );
        self.entries.insert(
            window_id,
            RetryEntry {
                window_id,
                attempts,
                next_attempt_at,
            },
        );
        true
    }

    /// Window ids whose re-attempt is due, in stable order.
    pub fn due(&self, now: Instant) -> Vec<WindowId> {
        let mut due: Vec<WindowId> = self
            .entries
            .values()
            .filter(|entry| entry.next_attempt_at <= now)
            .map(|entry| entry.window_id)
            .collect();
        due.sort_unstable();
        due
    }

    /// The attempt succeeded; forget the entry.
    pub fn resolve(&mut self, window_id: WindowId) {
        self.entries.remove(&window_id);
    }

    /// The window is gone; forget everything about it.
    pub fn remove(&mut self, window_id: WindowId) {
        self.entries.remove(&window_id);
        self.abandoned.remove(&window_id);
    }

    pub fn is_abandoned(&self, window_id: WindowId) -> bool {
        self.abandoned.contains(&window_id)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

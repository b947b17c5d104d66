use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::tracker::operations;
use crate::tracker::types::{WindowClass, WindowInitState};
use crate::windows::traits::WindowSystem;
use crate::windows::types::{WindowEventKind, WindowId};

/// Process-local readiness tracker, one accumulator per observed window.
pub struct WindowTracker {
    windows: HashMap<WindowId, WindowInitState>,
    idle_timeout: Duration,
}

impl WindowTracker {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            idle_timeout,
        }
    }

    /// Fold a lifecycle notification into the window's state.
    ///
    /// Returns whether the window is ready after the event. A `Destroyed`
    /// notification drops the state entirely and returns false.
    pub fn observe(&mut self, window_id: WindowId, kind: WindowEventKind) -> bool {
        if window_id == 0 {
            return false;
        }
        if kind == WindowEventKind::Destroyed {
            self.remove(window_id);
            return false;
        }

        let now = Instant::now();
        let state = self
            .windows
            .entry(window_id)
            .or_insert_with(|| WindowInitState::new(window_id, now));
        state.last_event_at = now;
        if let Some(flag) = operations::readiness_flag(kind) {
            state.flags.insert(flag);
        }
        state.is_ready()
    }

    pub fn is_tracked(&self, window_id: WindowId) -> bool {
        self.windows.contains_key(&window_id)
    }

    pub fn is_ready(&self, window_id: WindowId) -> bool {
        self.windows
            .get(&window_id)
            .is_some_and(|state| state.is_ready())
    }

    /// The window's classification, computed lazily from windowing-system
    /// metadata on first use and cached. A failed metadata query leaves the
    /// window unclassified; the next call asks again.
    pub fn classification<W: WindowSystem>(
        &mut self,
        window_id: WindowId,
        windows: &W,
    ) -> WindowClass {
        let Some(state) = self.windows.get_mut(&window_id) else {
            return WindowClass::Unknown;
        };
        if state.class != WindowClass::Unknown {
            return state.class;
        }

        match windows.window_metadata(window_id) {
            Ok(metadata) => {
                state.class = operations::classify(&metadata);
                debug!(
                    event = "core.tracker.window_classified",
                    window_id = window_id,
                    class = ?state.class
                );
                state.class
            }
            Err(e) => {
                debug!(
                    event = "core.tracker.classification_deferred",
                    window_id = window_id,
                    error = %e
                );
                WindowClass::Unknown
            }
        }
    }

    /// Ready and of a class we are allowed to touch.
    pub fn is_eligible<W: WindowSystem>(&mut self, window_id: WindowId, windows: &W) -> bool {
        self.is_ready(window_id) && self.classification(window_id, windows).is_eligible()
    }

    pub fn remove(&mut self, window_id: WindowId) {
        if self.windows.remove(&window_id).is_some() {
            debug!(event = "core.tracker.window_dropped", window_id = window_id);
        }
    }

    /// Drop windows that never became ready and have produced no events for
    /// the idle timeout. Ready windows stay until destroyed.
    pub fn prune_idle(&mut self, now: Instant) -> usize {
        let timeout = self.idle_timeout;
        let before = self.windows.len();
        self.windows.retain(|_, state| {
            state.is_ready()
                || now.saturating_duration_since(state.last_event_at) < timeout
        });
        before - self.windows.len()
    }

    pub fn tracked_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::backends::dry_run::DryRunWindowSystem;
    use crate::windows::errors::WindowSystemError;
    use crate::windows::types::{ModificationOptions, WindowMetadata};
    use std::cell::Cell;

    const READINESS_EVENTS: [WindowEventKind; 4] = [
        WindowEventKind::Created,
        WindowEventKind::OrderedIn,
        WindowEventKind::Resized,
        WindowEventKind::Updated,
    ];

    fn tracker() -> WindowTracker {
        WindowTracker::new(Duration::from_secs(300))
    }

    fn permutations(events: &[WindowEventKind]) -> Vec<Vec<WindowEventKind>> {
        if events.len() <= 1 {
            return vec![events.to_vec()];
        }
        let mut result = Vec::new();
        for (i, &first) in events.iter().enumerate() {
            let mut rest = events.to_vec();
            rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, first);
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn test_every_permutation_reaches_ready() {
        for (n, permutation) in permutations(&READINESS_EVENTS).into_iter().enumerate() {
            let mut tracker = tracker();
            let id = n as WindowId + 1;
            for (i, kind) in permutation.iter().enumerate() {
                let ready = tracker.observe(id, *kind);
                assert_eq!(ready, i == permutation.len() - 1, "permutation {:?}", permutation);
            }
            assert!(tracker.is_ready(id));
        }
    }

    #[test]
    fn test_duplicates_and_noise_do_not_fake_readiness() {
        let mut tracker = tracker();
        let noise = [
            WindowEventKind::Focused,
            WindowEventKind::Unfocused,
            WindowEventKind::OrderedOut,
        ];

        // Three distinct bits, heavily duplicated and interleaved with
        // non-readiness events, never reach ready.
        for _ in 0..3 {
            for kind in [
                WindowEventKind::Created,
                WindowEventKind::OrderedIn,
                WindowEventKind::Resized,
            ] {
                assert!(!tracker.observe(7, kind));
            }
            for kind in noise {
                assert!(!tracker.observe(7, kind));
            }
        }
        assert!(!tracker.is_ready(7));

        // The fourth distinct bit completes readiness.
        assert!(tracker.observe(7, WindowEventKind::Updated));
        assert!(tracker.is_ready(7));
    }

    #[test]
    fn test_three_of_four_never_ready_for_any_combination() {
        for skip in 0..READINESS_EVENTS.len() {
            let mut tracker = tracker();
            for (i, kind) in READINESS_EVENTS.iter().enumerate() {
                if i == skip {
                    continue;
                }
                for _ in 0..5 {
                    assert!(!tracker.observe(9, *kind));
                }
            }
            assert!(!tracker.is_ready(9), "skipped event index {}", skip);
        }
    }

    #[test]
    fn test_destroyed_drops_state() {
        let mut tracker = tracker();
        for kind in READINESS_EVENTS {
            tracker.observe(5, kind);
        }
        assert!(tracker.is_ready(5));

        tracker.observe(5, WindowEventKind::Destroyed);
        assert!(!tracker.is_tracked(5));
        assert!(!tracker.is_ready(5));
    }

    #[test]
    fn test_window_id_zero_is_ignored() {
        let mut tracker = tracker();
        assert!(!tracker.observe(0, WindowEventKind::Created));
        assert!(!tracker.is_tracked(0));
    }

    #[test]
    fn test_classification_is_cached() {
        let mut tracker = tracker();
        let mut windows = DryRunWindowSystem::new();
        let mut panel = WindowMetadata::standard(100);
        panel.level = 3;
        windows.set_metadata(8, panel);

        tracker.observe(8, WindowEventKind::Created);
        assert_eq!(tracker.classification(8, &windows), WindowClass::Panel);

        // Later metadata changes do not reclassify the window.
        windows.set_metadata(8, WindowMetadata::standard(100));
        assert_eq!(tracker.classification(8, &windows), WindowClass::Panel);
    }

    struct FlakyMetadata {
        failures_left: Cell<u32>,
    }

    impl WindowSystem for FlakyMetadata {
        fn window_metadata(
            &self,
            window_id: WindowId,
        ) -> Result<WindowMetadata, WindowSystemError> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(WindowSystemError::NotReady { window_id });
            }
            Ok(WindowMetadata::standard(100))
        }

        fn apply_options(
            &mut self,
            _window_id: WindowId,
            _options: &ModificationOptions,
        ) -> Result<(), WindowSystemError> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_metadata_query_retries_later() {
        let mut tracker = tracker();
        let windows = FlakyMetadata {
            failures_left: Cell::new(1),
        };

        tracker.observe(4, WindowEventKind::Created);
        assert_eq!(tracker.classification(4, &windows), WindowClass::Unknown);
        // The failure was not cached; the next query classifies.
        assert_eq!(tracker.classification(4, &windows), WindowClass::Standard);
    }

    #[test]
    fn test_ineligible_classes_block_ready_windows() {
        let mut tracker = tracker();
        let mut windows = DryRunWindowSystem::new();
        let mut chrome = WindowMetadata::standard(100);
        chrome.level = 30;
        windows.set_metadata(6, chrome);

        for kind in READINESS_EVENTS {
            tracker.observe(6, kind);
        }
        assert!(tracker.is_ready(6));
        assert!(!tracker.is_eligible(6, &windows));
    }

    #[test]
    fn test_prune_idle_keeps_ready_and_active_windows() {
        let mut tracker = tracker();
        for kind in READINESS_EVENTS {
            tracker.observe(1, kind);
        }
        tracker.observe(2, WindowEventKind::Created);

        // Nothing is idle yet.
        assert_eq!(tracker.prune_idle(Instant::now()), 0);
        assert_eq!(tracker.tracked_count(), 2);

        // Far in the future: the partially-ready window is reclaimed, the
        // ready one stays until destroyed.
        let later = Instant::now() + Duration::from_secs(600);
        assert_eq!(tracker.prune_idle(later), 1);
        assert!(tracker.is_tracked(1));
        assert!(!tracker.is_tracked(2));
    }
}

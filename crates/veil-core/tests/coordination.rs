//! End-to-end coordination: lifecycle events in, at-most-one modification
//! out, across several cooperating registry handles.

use std::time::{Duration, Instant};

use veil_core::registry::types::RegistrySettings;
use veil_core::windows::types::WindowEventKind;
use veil_core::{
    Coordinator, DryRunWindowSystem, ModificationOptions, Registry, RetryPolicy, WindowEvent,
};

const READINESS_EVENTS: [WindowEventKind; 4] = [
    WindowEventKind::Created,
    WindowEventKind::OrderedIn,
    WindowEventKind::Resized,
    WindowEventKind::Updated,
];

fn coordinator_in(dir: &std::path::Path) -> Coordinator<DryRunWindowSystem> {
    let mut settings = RegistrySettings::file_in_dir(dir);
    settings.capacity = 64;
    Coordinator::new(
        DryRunWindowSystem::new(),
        Registry::open(&settings),
        ModificationOptions::default(),
        RetryPolicy::default(),
        Duration::from_secs(300),
    )
}

#[test]
fn test_window_observed_by_many_processes_is_modified_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut coordinators: Vec<_> = (0..3).map(|_| coordinator_in(dir.path())).collect();

    // Every process sees the same window reach readiness, in a different
    // event order, with duplicates.
    for (i, coordinator) in coordinators.iter_mut().enumerate() {
        let mut events = READINESS_EVENTS.to_vec();
        events.rotate_left(i);
        events.push(READINESS_EVENTS[i % 4]);
        for kind in events {
            coordinator.handle_event(WindowEvent::new(42, kind));
        }
    }

    let total_applied: usize = coordinators
        .iter()
        .map(|c| c.windows().applied_count(42))
        .sum();
    assert_eq!(total_applied, 1, "window 42 must be modified exactly once");
    assert!(coordinators[2].registry().is_modified(42));
}

#[test]
fn test_each_process_modifies_its_own_windows() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = coordinator_in(dir.path());
    let mut second = coordinator_in(dir.path());

    for kind in READINESS_EVENTS {
        first.handle_event(WindowEvent::new(10, kind));
        second.handle_event(WindowEvent::new(20, kind));
    }

    assert_eq!(first.windows().applied_count(10), 1);
    assert_eq!(second.windows().applied_count(20), 1);
    assert_eq!(first.registry().count_modified(), 2);
    assert!(first.registry().is_modified(20));
    assert!(second.registry().is_modified(10));
}

#[test]
fn test_retry_handoff_does_not_leak_to_other_processes() {
    let dir = tempfile::tempdir().unwrap();

    let mut settings = RegistrySettings::file_in_dir(dir.path());
    settings.capacity = 64;
    let mut stubborn_windows = DryRunWindowSystem::new();
    stubborn_windows.fail_next_applies(42, 1);
    let mut first = Coordinator::new(
        stubborn_windows,
        Registry::open(&settings),
        ModificationOptions::default(),
        RetryPolicy::default(),
        Duration::from_secs(300),
    );
    let mut second = coordinator_in(dir.path());

    // The first process sees the window but cannot modify it yet.
    for kind in READINESS_EVENTS {
        first.handle_event(WindowEvent::new(42, kind));
    }
    assert_eq!(first.pending_retries(), 1);
    assert!(!first.registry().is_modified(42));

    // The second process gets there first.
    for kind in READINESS_EVENTS {
        second.handle_event(WindowEvent::new(42, kind));
    }
    assert_eq!(second.windows().applied_count(42), 1);

    // The first process's retry finds the registry entry and stands down.
    let stats = first.sweep(Instant::now() + Duration::from_secs(2));
    assert_eq!(stats.attempted, 1);
    assert_eq!(stats.modified, 0);
    assert_eq!(first.windows().applied_count(42), 0);
    assert_eq!(first.pending_retries(), 0);
}

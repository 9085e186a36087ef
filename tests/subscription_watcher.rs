// tests/subscription_watcher.rs

//! End-to-end tests for the subscription backend: directory-only
//! registrations, coalesced batches, delivery gated on process activity.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use pathwatch::{AlwaysActive, EventKinds, FileWatcher, WatchError};
use tempfile::TempDir;

use common::{CollectingObserver, ToggleActivation, init_tracing};

const WAIT: Duration = Duration::from_secs(3);
const SETTLE: Duration = Duration::from_millis(500);

fn active_watcher() -> (FileWatcher, Arc<CollectingObserver>) {
    init_tracing();
    let watcher = FileWatcher::with_subscription(Arc::new(AlwaysActive)).unwrap();
    let observer = CollectingObserver::new();
    watcher.set_observer(&observer.as_observer());
    (watcher, observer)
}

#[test]
fn rejects_plain_files() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, "x").unwrap();

    let (watcher, _observer) = active_watcher();
    let err = watcher.add_path(&file).unwrap_err();
    assert!(matches!(err, WatchError::InvalidPathKind(_)));
}

#[test]
fn rejects_missing_paths() {
    let (watcher, _observer) = active_watcher();
    let err = watcher.add_path("/definitely/not/here").unwrap_err();
    assert!(matches!(err, WatchError::PathNotFound(_)));
}

#[test]
fn removing_unwatched_directory_fails() {
    let dir = TempDir::new().unwrap();
    let (watcher, _observer) = active_watcher();
    let err = watcher.remove_path(dir.path()).unwrap_err();
    assert!(matches!(err, WatchError::NotWatched(_)));
}

#[test]
fn active_process_gets_live_delivery() {
    let dir = TempDir::new().unwrap();
    let canon = dir.path().canonicalize().unwrap();

    let (watcher, observer) = active_watcher();
    watcher.add_path(dir.path()).unwrap();

    fs::write(dir.path().join("a.txt"), "x").unwrap();

    assert!(observer.wait_for(WAIT, |events| {
        events
            .iter()
            .any(|(path, kinds)| *path == canon && kinds.contains(EventKinds::WRITE))
    }));
}

#[test]
fn inactive_process_defers_until_activation() {
    let dir = TempDir::new().unwrap();
    let canon = dir.path().canonicalize().unwrap();

    init_tracing();
    let activation = ToggleActivation::new(false);
    let watcher = FileWatcher::with_subscription(activation.clone()).unwrap();
    let observer = CollectingObserver::new();
    watcher.set_observer(&observer.as_observer());

    watcher.add_path(dir.path()).unwrap();

    for i in 0..3 {
        fs::write(dir.path().join("doc.txt"), format!("rev {i}")).unwrap();
        std::thread::sleep(Duration::from_millis(50));
    }

    // Nothing reaches the observer while the process is inactive.
    std::thread::sleep(SETTLE);
    assert_eq!(observer.count(), 0);

    activation.set_active(true);
    watcher.process_activated();

    // The burst of writes coalesces into a batch for the directory.
    assert!(observer.wait_for(WAIT, |events| {
        events
            .iter()
            .any(|(path, kinds)| *path == canon && kinds.contains(EventKinds::WRITE))
    }));
}

#[test]
fn removed_directory_stops_reporting() {
    let dir = TempDir::new().unwrap();
    let canon = dir.path().canonicalize().unwrap();

    let (watcher, observer) = active_watcher();
    watcher.add_path(dir.path()).unwrap();
    watcher.remove_path(dir.path()).unwrap();

    fs::write(dir.path().join("a.txt"), "x").unwrap();
    std::thread::sleep(SETTLE);
    assert!(observer.events().iter().all(|(path, _)| *path != canon));
}

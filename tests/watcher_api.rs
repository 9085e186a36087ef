// tests/watcher_api.rs
#![cfg(target_os = "linux")]

//! Watcher-level behaviour shared by both backends: observer lifetime,
//! notification publishing, the shared instance.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use pathwatch::{EventKinds, FileWatcher, WatchObserver, notifications};
use tempfile::TempDir;

use common::{CollectingObserver, RecordingSink, init_tracing};

const WAIT: Duration = Duration::from_secs(3);
const SETTLE: Duration = Duration::from_millis(300);

#[test]
fn vanished_observer_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, "one").unwrap();

    init_tracing();
    let watcher = FileWatcher::new();
    {
        let observer: Arc<dyn WatchObserver> = CollectingObserver::new();
        watcher.set_observer(&observer);
    } // only the weak reference remains

    assert!(watcher.observer().is_none());
    watcher.add_path(&file).unwrap();
    fs::write(&file, "two").unwrap();

    // Events are dropped quietly; teardown must not panic.
    std::thread::sleep(SETTLE);
    drop(watcher);
}

#[test]
fn replacing_the_observer_redirects_events() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, "one").unwrap();

    init_tracing();
    let watcher = FileWatcher::new();
    let first = CollectingObserver::new();
    watcher.set_observer(&first.as_observer());
    watcher.add_path(&file).unwrap();

    fs::write(&file, "two").unwrap();
    assert!(first.wait_for(WAIT, |events| !events.is_empty()));

    let second = CollectingObserver::new();
    watcher.set_observer(&second.as_observer());
    let first_count = first.count();

    fs::write(&file, "three").unwrap();
    assert!(second.wait_for(WAIT, |events| !events.is_empty()));
    assert_eq!(first.count(), first_count);
}

#[test]
fn always_notify_publishes_named_notifications() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, "one").unwrap();
    let canon = file.canonicalize().unwrap();

    init_tracing();
    let watcher = FileWatcher::new();
    let sink = RecordingSink::new();
    watcher.set_notification_sink(sink.clone());
    watcher.set_always_notify(true);
    assert!(watcher.always_notify());

    // No observer at all; the sink is the only consumer.
    watcher.add_path(&file).unwrap();
    fs::write(&file, "two").unwrap();

    assert!(sink.wait_for(WAIT, |published| {
        published
            .iter()
            .any(|(name, path)| name == notifications::WRITTEN && *path == canon)
    }));
}

#[test]
fn empty_kind_mask_means_every_kind() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.txt");
    fs::write(&file, "one").unwrap();
    let canon = file.canonicalize().unwrap();

    init_tracing();
    let watcher = FileWatcher::new();
    let observer = CollectingObserver::new();
    watcher.set_observer(&observer.as_observer());
    watcher
        .add_path_with_kinds(&file, EventKinds::empty())
        .unwrap();

    fs::write(&file, "two").unwrap();
    assert!(observer.wait_for(WAIT, |events| {
        events
            .iter()
            .any(|(path, kinds)| *path == canon && kinds.contains(EventKinds::WRITE))
    }));
}

#[test]
fn shared_instance_is_process_wide() {
    init_tracing();
    let a = FileWatcher::shared();
    let b = FileWatcher::shared();
    assert_eq!(a.id(), b.id());
}

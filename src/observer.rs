// src/observer.rs

//! Contracts between the watcher and its host application.
//!
//! [`WatchObserver`] is the per-event callback target. The watcher holds it
//! as a weak reference: it never extends the observer's lifetime, and a
//! vanished observer is a recoverable no-op on the next dispatch, not a
//! fault.
//!
//! [`NotificationSink`] abstracts the host's "publish a named event with a
//! payload" capability (a notification center, an event bus, ...). It is only
//! used when `always_notify` is enabled.
//!
//! [`ProcessActivation`] answers "is the consuming process foreground-active
//! right now?". The subscription backend uses it to decide whether to hold
//! back delivery and to warn about deferral.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::flags::EventKinds;

/// Names published through a [`NotificationSink`] when `always_notify` is
/// set, one per event kind.
pub mod notifications {
    pub const RENAMED: &str = "pathwatch.renamed";
    pub const WRITTEN: &str = "pathwatch.written";
    pub const DELETED: &str = "pathwatch.deleted";
    pub const ATTRIBUTES_CHANGED: &str = "pathwatch.attributes-changed";
    pub const SIZE_INCREASED: &str = "pathwatch.size-increased";
    pub const LINK_COUNT_CHANGED: &str = "pathwatch.link-count-changed";
    pub const ACCESS_REVOKED: &str = "pathwatch.access-revoked";
}

/// Identifies the watcher instance an event came from, so a single observer
/// can serve several watchers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        WatcherId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Receives per-event, per-path callbacks on the dispatch thread.
///
/// Override the per-kind methods for targeted handling, or override
/// [`WatchObserver::changed`] to handle everything in one place (its default
/// body fans out to the per-kind methods).
#[allow(unused_variables)]
pub trait WatchObserver: Send + Sync {
    fn path_renamed(&self, watcher: WatcherId, path: &Path) {}
    fn path_written(&self, watcher: WatcherId, path: &Path) {}
    fn path_deleted(&self, watcher: WatcherId, path: &Path) {}
    fn attributes_changed(&self, watcher: WatcherId, path: &Path) {}
    fn size_increased(&self, watcher: WatcherId, path: &Path) {}
    fn link_count_changed(&self, watcher: WatcherId, path: &Path) {}
    fn access_revoked(&self, watcher: WatcherId, path: &Path) {}

    /// Catch-all invoked once per dispatched event with the full kind mask.
    fn changed(&self, watcher: WatcherId, path: &Path, kinds: EventKinds) {
        if kinds.contains(EventKinds::RENAME) {
            self.path_renamed(watcher, path);
        }
        if kinds.contains(EventKinds::WRITE) {
            self.path_written(watcher, path);
        }
        if kinds.contains(EventKinds::DELETE) {
            self.path_deleted(watcher, path);
        }
        if kinds.contains(EventKinds::ATTRIBUTE) {
            self.attributes_changed(watcher, path);
        }
        if kinds.contains(EventKinds::EXTEND) {
            self.size_increased(watcher, path);
        }
        if kinds.contains(EventKinds::LINK_COUNT) {
            self.link_count_changed(watcher, path);
        }
        if kinds.contains(EventKinds::REVOKE) {
            self.access_revoked(watcher, path);
        }
    }
}

/// Publishes a named event with the changed path as payload.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, name: &str, path: &Path);
}

/// Foreground/background state of the consuming process.
pub trait ProcessActivation: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Default activation source for hosts without a foreground notion: always
/// active, so batches flush as soon as the primitive delivers them.
pub struct AlwaysActive;

impl ProcessActivation for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

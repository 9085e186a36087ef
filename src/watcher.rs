// src/watcher.rs

//! The `FileWatcher` aggregate: one backend, one dispatcher, plus the
//! observer association and delivery switches.
//!
//! Construct explicitly for a deterministic lifetime (tests should always do
//! this), or use [`FileWatcher::shared`] for a process-lifetime instance
//! shared by all callers. Dropping an explicit instance deregisters every
//! path and joins the backend and dispatch threads before returning, so no
//! callback fires after teardown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::fd::RawFd;

#[cfg(target_os = "linux")]
use std::sync::OnceLock;

use crate::backend::WatchBackend;
use crate::dispatch::{DispatchState, Dispatcher};
use crate::errors::{Result, WatchError};
use crate::flags::EventKinds;
use crate::observer::{NotificationSink, ProcessActivation, WatchObserver, WatcherId};
use crate::subscribe::SubscriptionWatcher;

#[cfg(target_os = "linux")]
use crate::queue::QueueWatcher;

pub struct FileWatcher {
    // Dropped first: releases the backend's dispatcher sender (and joins the
    // drain thread) so the dispatcher below can drain and join in turn.
    backend: Box<dyn WatchBackend>,
    dispatcher: Dispatcher,
    state: Arc<DispatchState>,
}

impl FileWatcher {
    /// A watcher on the kernel event queue backend. The queue itself is
    /// opened on the first `add_path`.
    #[cfg(target_os = "linux")]
    pub fn new() -> FileWatcher {
        let state = Arc::new(DispatchState::new());
        let dispatcher = Dispatcher::spawn(state.clone());
        let backend = Box::new(QueueWatcher::new(dispatcher.sender()));
        FileWatcher {
            backend,
            dispatcher,
            state,
        }
    }

    /// A watcher on the subscription backend: directories only, batched and
    /// coalesced delivery, held back while `activation` reports the process
    /// inactive.
    pub fn with_subscription(activation: Arc<dyn ProcessActivation>) -> Result<FileWatcher> {
        let state = Arc::new(DispatchState::new());
        let dispatcher = Dispatcher::spawn(state.clone());
        let backend = Box::new(SubscriptionWatcher::new(dispatcher.sender(), activation)?);
        Ok(FileWatcher {
            backend,
            dispatcher,
            state,
        })
    }

    /// The process-wide shared watcher: lazily constructed on first access,
    /// lives for the rest of the process, never torn down.
    #[cfg(target_os = "linux")]
    pub fn shared() -> &'static FileWatcher {
        static SHARED: OnceLock<FileWatcher> = OnceLock::new();
        SHARED.get_or_init(FileWatcher::new)
    }

    pub fn id(&self) -> WatcherId {
        self.state.id()
    }

    /// Watch `path` for every event kind.
    pub fn add_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.add_path_with_kinds(path, EventKinds::all())
    }

    /// Watch `path` for the given kinds (an empty mask means all kinds).
    ///
    /// Re-adding a watched path updates its kind mask in place; it never
    /// creates a second registration.
    pub fn add_path_with_kinds(&self, path: impl AsRef<Path>, kinds: EventKinds) -> Result<()> {
        let path = canonical(path.as_ref())?;
        let kinds = if kinds.is_empty() {
            EventKinds::all()
        } else {
            kinds
        };
        self.backend.add(&path, kinds)
    }

    pub fn remove_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        // The target may already be deleted; fall back to the path as given.
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.backend.remove(&canonical)
    }

    /// The current observer, if one was set and is still alive.
    pub fn observer(&self) -> Option<Arc<dyn WatchObserver>> {
        self.state.observer()
    }

    /// Associate an observer. The watcher keeps only a weak reference and
    /// tolerates the observer disappearing.
    pub fn set_observer(&self, observer: &Arc<dyn WatchObserver>) {
        self.state.set_observer(observer);
    }

    pub fn clear_observer(&self) {
        self.state.clear_observer();
    }

    pub fn always_notify(&self) -> bool {
        self.state.always_notify()
    }

    /// When set, every event is also published through the notification
    /// sink in addition to the direct observer callback.
    pub fn set_always_notify(&self, on: bool) {
        self.state.set_always_notify(on);
    }

    pub fn set_notification_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.state.set_sink(sink);
    }

    /// The raw kernel queue descriptor, for advanced integration. `None` for
    /// the subscription backend and while the queue backend is stopped.
    #[cfg(unix)]
    pub fn native_handle(&self) -> Option<RawFd> {
        self.backend.native_handle()
    }

    /// Tell the watcher the host process became foreground-active; the
    /// subscription backend flushes its deferred batch. No-op on the kernel
    /// queue backend.
    pub fn process_activated(&self) {
        self.backend.activated();
    }
}

#[cfg(target_os = "linux")]
impl Default for FileWatcher {
    fn default() -> Self {
        FileWatcher::new()
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|_| WatchError::PathNotFound(path.to_path_buf()))
}

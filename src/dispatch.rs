// src/dispatch.rs

//! Marshals raw backend events onto the dispatch thread.
//!
//! Each `FileWatcher` owns one dispatch thread fed through an unbounded
//! channel. The single consumer preserves the order the backend produced
//! events in (and with it, per-path ordering); observer callbacks run here,
//! outside every internal lock, so a slow observer can grow the backlog but
//! never starve the backend's drain loop. There is no backpressure, so a
//! pathologically slow observer is the caller's responsibility.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::flags::EventKinds;
use crate::observer::{NotificationSink, WatchObserver, WatcherId};

/// A translated backend event, consumed immediately by the dispatch thread.
pub(crate) struct PendingEvent {
    pub path: PathBuf,
    pub kinds: EventKinds,
}

/// Observer association and delivery switches, shared between the caller's
/// thread and the dispatch thread.
pub(crate) struct DispatchState {
    id: WatcherId,
    observer: Mutex<Option<Weak<dyn WatchObserver>>>,
    sink: Mutex<Option<Arc<dyn NotificationSink>>>,
    always_notify: AtomicBool,
}

impl DispatchState {
    pub fn new() -> Self {
        DispatchState {
            id: WatcherId::next(),
            observer: Mutex::new(None),
            sink: Mutex::new(None),
            always_notify: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn set_observer(&self, observer: &Arc<dyn WatchObserver>) {
        let mut slot = self.observer.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::downgrade(observer));
    }

    pub fn clear_observer(&self) {
        let mut slot = self.observer.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// The current observer, if one was set and is still alive.
    pub fn observer(&self) -> Option<Arc<dyn WatchObserver>> {
        let slot = self.observer.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().and_then(Weak::upgrade)
    }

    fn observer_was_set(&self) -> bool {
        let slot = self.observer.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }

    pub fn set_sink(&self, sink: Arc<dyn NotificationSink>) {
        let mut slot = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(sink);
    }

    fn sink(&self) -> Option<Arc<dyn NotificationSink>> {
        let slot = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    pub fn always_notify(&self) -> bool {
        self.always_notify.load(Ordering::Relaxed)
    }

    pub fn set_always_notify(&self, on: bool) {
        self.always_notify.store(on, Ordering::Relaxed);
    }
}

/// Owns the dispatch thread; dropping it closes the channel and joins the
/// thread once every backend-held sender is gone.
pub(crate) struct Dispatcher {
    tx: Option<Sender<PendingEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(state: Arc<DispatchState>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = std::thread::spawn(move || dispatch_loop(rx, state));
        Dispatcher {
            tx: Some(tx),
            thread: Some(thread),
        }
    }

    pub fn sender(&self) -> Sender<PendingEvent> {
        // Only `drop` takes the sender.
        self.tx.as_ref().expect("dispatcher already dropped").clone()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // The backend (and its sender clones) must already be gone by the
        // time this runs; field order in `FileWatcher` guarantees it.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn dispatch_loop(rx: Receiver<PendingEvent>, state: Arc<DispatchState>) {
    for event in rx.iter() {
        deliver(&state, &event.path, event.kinds);
    }
    debug!("dispatch loop ended");
}

fn deliver(state: &DispatchState, path: &Path, kinds: EventKinds) {
    match state.observer() {
        Some(observer) => observer.changed(state.id(), path, kinds),
        None if state.observer_was_set() => {
            // Observer dropped out from under us; recoverable, not a fault.
            debug!(?path, "observer gone, dropping event");
        }
        None => {}
    }

    if state.always_notify() {
        if let Some(sink) = state.sink() {
            for name in kinds.names() {
                sink.publish(name, path);
            }
        }
    }
}

// src/subscribe/mod.rs

//! Subscription backend: batched, coalescing delivery via `notify`.
//!
//! The registration unit is coarser than the kernel queue backend's: only
//! directories can be subscribed, each registered non-recursively with the
//! platform watcher. The backend owns no thread; it runs inside the
//! watcher's callback, merging changes into a [`batch::PendingBatch`] and
//! flushing the whole batch through the dispatcher whenever the host process
//! reports itself foreground-active (or when it is poked on reactivation).
//!
//! This is the deliberate fallback where the kernel queue is unavailable or
//! too expensive: it trades live delivery for lower resource usage, and the
//! delivery contract is correspondingly weak: at least one callback whose
//! kinds are a superset of what happened, with no cross-path ordering.

mod batch;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use notify::event::{DataChange, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::backend::WatchBackend;
use crate::dispatch::PendingEvent;
use crate::errors::{Result, WatchError};
use crate::flags::EventKinds;
use crate::observer::ProcessActivation;

use batch::PendingBatch;

pub(crate) struct SubscriptionWatcher {
    shared: Arc<SubscriptionShared>,
    watcher: Mutex<RecommendedWatcher>,
}

struct SubscriptionShared {
    /// Registered directories and their requested kind masks.
    paths: Mutex<HashMap<PathBuf, EventKinds>>,
    pending: Mutex<PendingBatch>,
    activation: Arc<dyn ProcessActivation>,
    events: Sender<PendingEvent>,
}

impl SubscriptionWatcher {
    pub fn new(
        events: Sender<PendingEvent>,
        activation: Arc<dyn ProcessActivation>,
    ) -> Result<Self> {
        let shared = Arc::new(SubscriptionShared {
            paths: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingBatch::default()),
            activation,
            events,
        });
        let watcher = {
            let shared = shared.clone();
            RecommendedWatcher::new(
                move |res: notify::Result<Event>| match res {
                    Ok(event) => shared.ingest(event),
                    Err(err) => warn!(%err, "subscription watcher error"),
                },
                Config::default(),
            )?
        };
        Ok(SubscriptionWatcher {
            shared,
            watcher: Mutex::new(watcher),
        })
    }
}

impl SubscriptionShared {
    /// Runs on the watcher's callback thread for every raw event batch.
    fn ingest(&self, event: Event) {
        let mut resolved: Vec<(PathBuf, EventKinds)> = Vec::new();
        {
            let paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
            for p in &event.paths {
                // Resolve back to a registered directory: the path itself,
                // or the directory containing the changed entry.
                let (root, requested, is_registered) = if let Some(kinds) = paths.get(p.as_path())
                {
                    (p.clone(), *kinds, true)
                } else {
                    match p.parent().and_then(|parent| {
                        paths.get(parent).map(|kinds| (parent.to_path_buf(), *kinds))
                    }) {
                        Some((parent, kinds)) => (parent, kinds, false),
                        None => continue,
                    }
                };
                let kinds = event_kinds(&event.kind, is_registered, requested);
                if !kinds.is_empty() {
                    resolved.push((root, kinds));
                }
            }
        }
        if resolved.is_empty() {
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (path, kinds) in resolved {
            pending.merge(path, kinds);
        }
        // Deliveries queue up while the process is inactive and go out in
        // one burst on reactivation.
        if self.activation.is_active() {
            flush(&mut pending, &self.events);
        }
    }
}

fn flush(pending: &mut PendingBatch, events: &Sender<PendingEvent>) {
    for (path, kinds) in pending.take() {
        if events.send(PendingEvent { path, kinds }).is_err() {
            break;
        }
    }
}

/// Translate a `notify` event kind, narrowed to the registration's mask.
///
/// `is_registered` distinguishes the watched directory itself from an entry
/// inside it: removing an entry is a write to the directory, removing the
/// directory is a delete.
fn event_kinds(kind: &EventKind, is_registered: bool, requested: EventKinds) -> EventKinds {
    let mut kinds = match kind {
        EventKind::Create(_) => EventKinds::WRITE,
        EventKind::Remove(_) => {
            if is_registered {
                EventKinds::DELETE
            } else {
                EventKinds::WRITE
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => EventKinds::RENAME,
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            if requested.contains(EventKinds::ATTRIBUTE) {
                EventKinds::ATTRIBUTE
            } else {
                EventKinds::LINK_COUNT
            }
        }
        EventKind::Modify(ModifyKind::Data(DataChange::Size)) => {
            if requested.contains(EventKinds::WRITE) {
                EventKinds::WRITE
            } else {
                EventKinds::EXTEND
            }
        }
        EventKind::Modify(_) => EventKinds::WRITE,
        EventKind::Access(_) => EventKinds::empty(),
        EventKind::Any | EventKind::Other => EventKinds::WRITE,
    };
    kinds &= requested;
    kinds
}

impl WatchBackend for SubscriptionWatcher {
    fn add(&self, path: &Path, kinds: EventKinds) -> Result<()> {
        let meta =
            fs::metadata(path).map_err(|_| WatchError::PathNotFound(path.to_path_buf()))?;
        if !meta.is_dir() {
            return Err(WatchError::InvalidPathKind(path.to_path_buf()));
        }

        let mut watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
        let mut paths = self.shared.paths.lock().unwrap_or_else(|e| e.into_inner());
        if !paths.contains_key(path) {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|err| WatchError::HandleOpenFailed {
                    path: path.to_path_buf(),
                    source: std::io::Error::other(err),
                })?;
        }
        // Re-adding updates the mask in place; never a second registration.
        paths.insert(path.to_path_buf(), kinds);
        debug!(?path, ?kinds, "subscription added");

        if !self.shared.activation.is_active() {
            warn!(?path, "process is not active; deliveries will be deferred and coalesced");
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
        {
            let mut paths = self.shared.paths.lock().unwrap_or_else(|e| e.into_inner());
            if paths.remove(path).is_none() {
                return Err(WatchError::NotWatched(path.to_path_buf()));
            }
        }
        if let Err(err) = watcher.unwatch(path) {
            match &err.kind {
                // Already gone underneath us (e.g. the directory was deleted).
                notify::ErrorKind::WatchNotFound => debug!(?path, "subscription already stale"),
                _ => warn!(?path, %err, "failed to drop subscription"),
            }
        }
        self.shared
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .discard(path);
        debug!(?path, "subscription removed");
        Ok(())
    }

    fn activated(&self) {
        let mut pending = self.shared.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.is_empty() {
            debug!("process activated; flushing deferred batch");
        }
        flush(&mut pending, &self.shared.events);
    }
}

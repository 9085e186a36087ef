// src/queue/mod.rs

//! Kernel event queue backend (Linux, inotify).
//!
//! Every watched path is registered against one inotify instance, serviced
//! by a dedicated drain thread. The queue is opened lazily on the first
//! `add`; removing the last path (and teardown) stops the loop synchronously
//! by arming a wake eventfd polled alongside the queue and joining the
//! thread, so shutdown latency is bounded by scheduling, not by a poll
//! interval, and no callback can fire after teardown returns.
//!
//! Rename policy: a rename of the watched object keeps the registration
//! alive. The kernel watch follows the inode, and events keep reporting
//! under the path the caller registered. Callers wanting to track the object
//! under its new name must re-resolve and re-add explicitly.

mod drain;

use std::fs;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use nix::errno::Errno;
use nix::sys::eventfd::EventFd;
use nix::sys::inotify::{InitFlags, Inotify, WatchDescriptor};
use tracing::{debug, warn};

use crate::backend::WatchBackend;
use crate::dispatch::PendingEvent;
use crate::errors::{Result, WatchError};
use crate::flags::EventKinds;
use crate::table::WatchTable;

pub(crate) struct QueueWatcher {
    table: Arc<Mutex<WatchTable<WatchDescriptor>>>,
    run: Mutex<Run>,
    events: Sender<PendingEvent>,
}

enum Run {
    Stopped,
    Running(RunState),
    /// The kernel queue could not be opened; sticky until the instance is
    /// reconstructed.
    Failed(Errno),
}

struct RunState {
    shared: Arc<QueueShared>,
    thread: JoinHandle<()>,
}

/// Shared with the drain thread for the lifetime of one run. Dropping the
/// last reference closes both descriptors.
struct QueueShared {
    inotify: Inotify,
    wake: EventFd,
}

impl QueueWatcher {
    pub fn new(events: Sender<PendingEvent>) -> Self {
        QueueWatcher {
            table: Arc::new(Mutex::new(WatchTable::new())),
            run: Mutex::new(Run::Stopped),
            events,
        }
    }

    /// Open the queue and spawn the drain thread if not yet running.
    fn ensure_running(&self, run: &mut Run) -> Result<Arc<QueueShared>> {
        match run {
            Run::Running(state) => Ok(state.shared.clone()),
            Run::Failed(errno) => Err(WatchError::QueueOpenFailed(
                std::io::Error::from_raw_os_error(*errno as i32),
            )),
            Run::Stopped => {
                let shared = match open_queue() {
                    Ok(shared) => Arc::new(shared),
                    Err(errno) => {
                        *run = Run::Failed(errno);
                        return Err(WatchError::QueueOpenFailed(
                            std::io::Error::from_raw_os_error(errno as i32),
                        ));
                    }
                };
                let thread = {
                    let shared = shared.clone();
                    let table = self.table.clone();
                    let events = self.events.clone();
                    std::thread::spawn(move || drain::drain_loop(shared, table, events))
                };
                debug!("kernel event queue opened");
                *run = Run::Running(RunState {
                    shared: shared.clone(),
                    thread,
                });
                Ok(shared)
            }
        }
    }

    /// Wake and join the drain thread, then close the queue.
    fn stop(run: &mut Run) {
        if let Run::Running(state) = std::mem::replace(run, Run::Stopped) {
            if let Err(errno) = state.shared.wake.arm() {
                warn!(%errno, "failed to signal drain loop");
            }
            if state.thread.join().is_err() {
                warn!("drain thread panicked");
            }
            debug!("kernel event queue closed");
        }
    }
}

fn open_queue() -> nix::Result<QueueShared> {
    let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
    let wake = EventFd::new()?;
    Ok(QueueShared { inotify, wake })
}

impl WatchBackend for QueueWatcher {
    fn add(&self, path: &Path, kinds: EventKinds) -> Result<()> {
        let meta = fs::symlink_metadata(path)
            .map_err(|_| WatchError::PathNotFound(path.to_path_buf()))?;

        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let shared = self.ensure_running(&mut *run)?;

        let mask = drain::register_mask(kinds, meta.is_dir());
        let wd = match shared.inotify.add_watch(path, mask) {
            Ok(wd) => wd,
            Err(errno) => {
                // A per-path failure leaves other registrations intact, but
                // an empty instance should not keep an idle loop alive.
                if self.table.lock().unwrap_or_else(|e| e.into_inner()).is_empty() {
                    Self::stop(&mut *run);
                }
                return Err(match errno {
                    Errno::ENOENT => WatchError::PathNotFound(path.to_path_buf()),
                    errno => WatchError::HandleOpenFailed {
                        path: path.to_path_buf(),
                        source: std::io::Error::from_raw_os_error(errno as i32),
                    },
                });
            }
        };

        let replaced = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.insert(path.to_path_buf(), wd, kinds)
        };
        if let Some(old) = replaced {
            // Superseded handle must not leak.
            if let Err(errno) = shared.inotify.rm_watch(old) {
                debug!(?path, %errno, "superseded descriptor already gone");
            }
        }
        debug!(?path, ?kinds, "watch added");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let removed = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.remove(path)
        };
        let Some((wd, _)) = removed else {
            return Err(WatchError::NotWatched(path.to_path_buf()));
        };

        if let Run::Running(state) = &*run {
            match state.shared.inotify.rm_watch(wd) {
                Ok(()) => {}
                // Stale handle: the object was deleted or renamed-then-replaced
                // and the kernel already dropped the watch.
                Err(Errno::EINVAL) => debug!(?path, "descriptor already stale"),
                Err(errno) => warn!(?path, %errno, "failed to close watch handle"),
            }
        }
        debug!(?path, "watch removed");

        let empty = self.table.lock().unwrap_or_else(|e| e.into_inner()).is_empty();
        if empty {
            Self::stop(&mut *run);
        }
        Ok(())
    }

    fn native_handle(&self) -> Option<RawFd> {
        let run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        match &*run {
            Run::Running(state) => Some(state.shared.inotify.as_fd().as_raw_fd()),
            _ => None,
        }
    }
}

impl Drop for QueueWatcher {
    fn drop(&mut self) {
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let drained = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.drain()
        };
        if let Run::Running(state) = &*run {
            for (path, wd) in drained {
                match state.shared.inotify.rm_watch(wd) {
                    Ok(()) | Err(Errno::EINVAL) => {}
                    Err(errno) => warn!(?path, %errno, "failed to close watch handle"),
                }
            }
        }
        Self::stop(&mut *run);
    }
}

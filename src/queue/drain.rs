// src/queue/drain.rs

//! The dedicated drain loop and the translation between kernel flag bits and
//! the crate's event-kind vocabulary.

use std::os::fd::AsFd;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::inotify::{AddWatchFlags, InotifyEvent, WatchDescriptor};
use tracing::{debug, warn};

use super::QueueShared;
use crate::dispatch::PendingEvent;
use crate::flags::EventKinds;
use crate::table::WatchTable;

/// Block on the queue until events arrive or the wake descriptor is armed.
///
/// Per-event errors are logged and swallowed; the loop only exits on
/// shutdown, on a dead dispatcher, or if the queue itself fails.
pub(super) fn drain_loop(
    shared: Arc<QueueShared>,
    table: Arc<Mutex<WatchTable<WatchDescriptor>>>,
    events: Sender<PendingEvent>,
) {
    debug!("drain loop started");
    loop {
        let woken = {
            let mut fds = [
                PollFd::new(shared.inotify.as_fd(), PollFlags::POLLIN),
                PollFd::new(shared.wake.as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => fds[1]
                    .revents()
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN)),
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    warn!(%errno, "poll on event queue failed; stopping drain loop");
                    return;
                }
            }
        };
        if woken {
            break;
        }

        loop {
            let batch = match shared.inotify.read_events() {
                Ok(batch) => batch,
                // Spurious wakeup: nothing to read, re-block.
                Err(Errno::EAGAIN) => break,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    warn!(%errno, "reading event queue failed; stopping drain loop");
                    return;
                }
            };
            for event in batch {
                if !handle_event(&table, &events, event) {
                    return;
                }
            }
        }
    }
    debug!("drain loop stopped");
}

/// Returns `false` once the dispatcher is gone and the loop should exit.
fn handle_event(
    table: &Mutex<WatchTable<WatchDescriptor>>,
    events: &Sender<PendingEvent>,
    event: InotifyEvent,
) -> bool {
    if event.mask.contains(AddWatchFlags::IN_Q_OVERFLOW) {
        warn!("kernel event queue overflowed; changes were dropped");
        return true;
    }
    if event.mask.contains(AddWatchFlags::IN_IGNORED) {
        // The kernel dropped the watch (object deleted, unmounted, or the
        // handle was closed). The table entry stays until explicit removal.
        debug!(wd = ?event.wd, "kernel dropped a watch");
        return true;
    }

    let resolved = {
        let table = table.lock().unwrap_or_else(|e| e.into_inner());
        table
            .resolve(event.wd)
            .map(|(path, kinds)| (path.to_path_buf(), kinds))
    };
    let Some((path, requested)) = resolved else {
        debug!(wd = ?event.wd, "event for unknown descriptor");
        return true;
    };

    let kinds = event_kinds(event.mask, requested);
    if kinds.is_empty() {
        return true;
    }
    events.send(PendingEvent { path, kinds }).is_ok()
}

/// Kernel registration mask for a requested kind set.
///
/// Directory registrations also watch entry churn: creations and deletions
/// count as writes to the directory, entry renames as renames.
pub(super) fn register_mask(kinds: EventKinds, is_dir: bool) -> AddWatchFlags {
    let mut mask = AddWatchFlags::empty();
    if kinds.contains(EventKinds::RENAME) {
        mask |= AddWatchFlags::IN_MOVE_SELF;
        if is_dir {
            mask |= AddWatchFlags::IN_MOVED_FROM | AddWatchFlags::IN_MOVED_TO;
        }
    }
    if kinds.intersects(EventKinds::WRITE | EventKinds::EXTEND) {
        mask |= AddWatchFlags::IN_MODIFY;
        if is_dir {
            mask |= AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE;
        }
    }
    if kinds.contains(EventKinds::DELETE) {
        mask |= AddWatchFlags::IN_DELETE_SELF;
    }
    if kinds.intersects(EventKinds::ATTRIBUTE | EventKinds::LINK_COUNT) {
        mask |= AddWatchFlags::IN_ATTRIB;
    }
    if kinds.contains(EventKinds::REVOKE) {
        mask |= AddWatchFlags::IN_UNMOUNT;
    }
    mask
}

/// Translate raw kernel bits to event kinds, narrowed to what the
/// registration asked for.
pub(super) fn event_kinds(mask: AddWatchFlags, requested: EventKinds) -> EventKinds {
    let mut kinds = EventKinds::empty();
    if mask.intersects(
        AddWatchFlags::IN_MOVE_SELF | AddWatchFlags::IN_MOVED_FROM | AddWatchFlags::IN_MOVED_TO,
    ) {
        kinds |= EventKinds::RENAME;
    }
    if mask.intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE) {
        kinds |= EventKinds::WRITE;
    }
    if mask.contains(AddWatchFlags::IN_MODIFY) {
        // inotify cannot tell growth apart from other writes.
        kinds |= if requested.contains(EventKinds::WRITE) {
            EventKinds::WRITE
        } else {
            EventKinds::EXTEND
        };
    }
    if mask.contains(AddWatchFlags::IN_ATTRIB) {
        // Link count changes surface as attribute changes here.
        kinds |= if requested.contains(EventKinds::ATTRIBUTE) {
            EventKinds::ATTRIBUTE
        } else {
            EventKinds::LINK_COUNT
        };
    }
    if mask.contains(AddWatchFlags::IN_DELETE_SELF) {
        kinds |= EventKinds::DELETE;
    }
    if mask.contains(AddWatchFlags::IN_UNMOUNT) {
        kinds |= EventKinds::REVOKE;
    }
    kinds & requested
}

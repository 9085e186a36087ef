// src/lib.rs

//! Per-path file watching for applications that must react to out-of-process
//! filesystem mutations (a document reloading when edited externally, a
//! panel refreshing when a directory changes underneath it).
//!
//! Each watched path is an independent leaf registration; this is not a
//! recursive tree watcher. Two backends implement the same contract:
//!
//! - the **kernel queue backend** ([`FileWatcher::new`], Linux) multiplexes
//!   all watched paths onto one inotify instance drained by a dedicated
//!   thread, for live delivery;
//! - the **subscription backend** ([`FileWatcher::with_subscription`])
//!   registers directories with the platform watcher and delivers batched,
//!   coalesced callbacks, holding them back while the host process reports
//!   itself inactive.
//!
//! Events reach the consumer through a [`WatchObserver`] held by weak
//! reference, dispatched on a dedicated thread in production order per path.
//! With `always_notify` set, events are additionally published through a
//! [`NotificationSink`] under the [`observer::notifications`] names.

mod backend;
mod dispatch;
#[cfg(target_os = "linux")]
mod queue;
mod subscribe;
mod table;

pub mod errors;
pub mod flags;
pub mod observer;
pub mod watcher;

pub use errors::{Result, WatchError};
pub use flags::EventKinds;
pub use observer::{
    AlwaysActive, NotificationSink, ProcessActivation, WatchObserver, WatcherId, notifications,
};
pub use watcher::FileWatcher;

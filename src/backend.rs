// src/backend.rs

//! The capability set a `FileWatcher` needs from its backend.
//!
//! Two independent implementations exist, the kernel queue backend
//! (`queue`) and the subscription backend (`subscribe`), selected at
//! construction and composed behind this trait, not subclassed.

use std::path::Path;

#[cfg(unix)]
use std::os::fd::RawFd;

use crate::errors::Result;
use crate::flags::EventKinds;

pub(crate) trait WatchBackend: Send + Sync {
    /// Register `path`, or update its kind mask if already registered.
    fn add(&self, path: &Path, kinds: EventKinds) -> Result<()>;

    /// Deregister `path`; `WatchError::NotWatched` if it has no entry.
    fn remove(&self, path: &Path) -> Result<()>;

    /// The raw kernel handle behind the backend, for advanced integration.
    /// Only the kernel queue backend has one.
    #[cfg(unix)]
    fn native_handle(&self) -> Option<RawFd> {
        None
    }

    /// The host process became foreground-active; deliver anything held
    /// back. Only meaningful for the subscription backend.
    fn activated(&self) {}
}

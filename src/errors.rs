// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Per-path failures (`PathNotFound`, `InvalidPathKind`, `NotWatched`,
//! `HandleOpenFailed`) are returned synchronously from `add_path` /
//! `remove_path` and never affect other registrations. `QueueOpenFailed` is
//! fatal to the instance: once the kernel queue cannot be opened, every later
//! `add_path` reports it until the watcher is reconstructed.
//!
//! Re-adding an already-watched path is deliberately *not* an error; the
//! stored kind mask is updated in place.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {0}")]
    InvalidPathKind(PathBuf),

    #[error("path is not watched: {0}")]
    NotWatched(PathBuf),

    #[error("failed to open kernel event queue")]
    QueueOpenFailed(#[source] io::Error),

    #[error("failed to open watch handle for {path}")]
    HandleOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("subscription backend error")]
    Subscription(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchError>;

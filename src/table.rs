// src/table.rs

//! Bidirectional mapping between watched paths and their backend
//! descriptors.
//!
//! The table is the single piece of shared state between caller threads
//! (add/remove) and the drain thread (descriptor→path resolution); the owning
//! backend serializes access with one mutex, held only for the duration of a
//! lookup or mutation.
//!
//! Invariants:
//! - a path has at most one live entry;
//! - no two entries share a descriptor; if the kernel reuses a descriptor
//!   number, the stale entry it previously mapped to is evicted on insert.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use crate::flags::EventKinds;

pub(crate) struct WatchTable<D> {
    by_path: HashMap<PathBuf, Entry<D>>,
    by_descriptor: HashMap<D, PathBuf>,
}

struct Entry<D> {
    descriptor: D,
    kinds: EventKinds,
}

impl<D: Copy + Eq + Hash> WatchTable<D> {
    pub fn new() -> Self {
        WatchTable {
            by_path: HashMap::new(),
            by_descriptor: HashMap::new(),
        }
    }

    /// Store a registration. Returns the descriptor previously held by the
    /// same path, if it differs, so the caller can close it.
    pub fn insert(&mut self, path: PathBuf, descriptor: D, kinds: EventKinds) -> Option<D> {
        // Descriptor number reused by the kernel: drop the stale entry.
        if let Some(stale) = self.by_descriptor.insert(descriptor, path.clone()) {
            if stale != path {
                self.by_path.remove(&stale);
            }
        }

        let old = self.by_path.insert(path, Entry { descriptor, kinds });
        match old {
            Some(entry) if entry.descriptor != descriptor => {
                self.by_descriptor.remove(&entry.descriptor);
                Some(entry.descriptor)
            }
            _ => None,
        }
    }

    pub fn remove(&mut self, path: &Path) -> Option<(D, EventKinds)> {
        let entry = self.by_path.remove(path)?;
        self.by_descriptor.remove(&entry.descriptor);
        Some((entry.descriptor, entry.kinds))
    }

    /// Resolve an incoming low-level event back to its registration.
    pub fn resolve(&self, descriptor: D) -> Option<(&Path, EventKinds)> {
        let path = self.by_descriptor.get(&descriptor)?;
        let entry = self.by_path.get(path)?;
        Some((path.as_path(), entry.kinds))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Empty the table, yielding every registration for teardown.
    pub fn drain(&mut self) -> Vec<(PathBuf, D)> {
        self.by_descriptor.clear();
        self.by_path
            .drain()
            .map(|(path, entry)| (path, entry.descriptor))
            .collect()
    }
}

// src/subscribe/batch.rs

//! Coalescing buffer for the subscription backend.
//!
//! Multiple discrete changes to the same path collapse into one pending
//! entry whose kind mask is the union of everything observed. The delivery
//! contract is "at least one notification, kinds a superset of what
//! happened", never an exact count.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::flags::EventKinds;

#[derive(Default)]
pub(super) struct PendingBatch {
    changes: HashMap<PathBuf, EventKinds>,
}

impl PendingBatch {
    pub fn merge(&mut self, path: PathBuf, kinds: EventKinds) {
        *self.changes.entry(path).or_insert(EventKinds::empty()) |= kinds;
    }

    /// Forget anything pending for a deregistered path.
    pub fn discard(&mut self, path: &Path) {
        self.changes.remove(path);
    }

    pub fn take(&mut self) -> Vec<(PathBuf, EventKinds)> {
        self.changes.drain().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

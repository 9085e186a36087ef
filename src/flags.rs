// src/flags.rs

//! The event-kind vocabulary shared by both backends.
//!
//! Callers combine kinds with bitwise-or to narrow what a registration
//! reports; backends intersect translated kernel flags with the requested
//! mask before dispatching.

use bitflags::bitflags;

bitflags! {
    /// Bitmask of filesystem change kinds.
    ///
    /// An empty mask passed to `add_path_with_kinds` is treated as
    /// [`EventKinds::all`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventKinds: u32 {
        /// The watched object was renamed, or an entry inside a watched
        /// directory was renamed.
        const RENAME = 1 << 0;
        /// The contents changed (for a directory: an entry was created or
        /// removed).
        const WRITE = 1 << 1;
        /// The watched object was deleted.
        const DELETE = 1 << 2;
        /// Metadata (permissions, timestamps, ownership) changed.
        const ATTRIBUTE = 1 << 3;
        /// The object grew in size.
        const EXTEND = 1 << 4;
        /// The object's hard link count changed.
        const LINK_COUNT = 1 << 5;
        /// Access to the object was revoked (e.g. the filesystem was
        /// unmounted underneath it).
        const REVOKE = 1 << 6;
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        EventKinds::all()
    }
}

impl EventKinds {
    /// Iterate the set bits together with their notification names.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        use crate::observer::notifications;
        const NAMES: [(EventKinds, &str); 7] = [
            (EventKinds::RENAME, notifications::RENAMED),
            (EventKinds::WRITE, notifications::WRITTEN),
            (EventKinds::DELETE, notifications::DELETED),
            (EventKinds::ATTRIBUTE, notifications::ATTRIBUTES_CHANGED),
            (EventKinds::EXTEND, notifications::SIZE_INCREASED),
            (EventKinds::LINK_COUNT, notifications::LINK_COUNT_CHANGED),
            (EventKinds::REVOKE, notifications::ACCESS_REVOKED),
        ];
        NAMES
            .into_iter()
            .filter_map(move |(kind, name)| self.contains(kind).then_some(name))
    }
}

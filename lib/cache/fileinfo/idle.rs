//! Release-ordered storage of idle entries.

use hashlink::LinkedHashMap;

use super::entry::{EntryId, FileInfoEntry};

/// Idle entries in release order, oldest at the front.
///
/// Unlike the checked-out entries, which live with whoever acquired them, idle entries are
/// stored here by value.
pub struct IdleQueue<H> {
    entries: LinkedHashMap<EntryId, FileInfoEntry<H>>,
}

impl<H> Default for IdleQueue<H> {
    fn default() -> Self {
        Self {
            entries: LinkedHashMap::new(),
        }
    }
}

impl<H> IdleQueue<H> {
    /// Append `entry` as the newest idle entry.
    pub fn push_back(&mut self, entry: FileInfoEntry<H>) {
        let previous = self.entries.insert(entry.id, entry);
        debug_assert!(previous.is_none(), "entry queued twice");
    }

    /// The entry that has been idle the longest.
    #[must_use]
    pub fn front(&self) -> Option<&FileInfoEntry<H>> {
        self.entries.front().map(|(_, entry)| entry)
    }

    /// Remove the entry that has been idle the longest.
    pub fn pop_front(&mut self) -> Option<FileInfoEntry<H>> {
        self.entries.pop_front().map(|(_, entry)| entry)
    }

    /// Remove a specific entry, wherever it sits in the queue.
    pub fn remove(&mut self, id: EntryId) -> Option<FileInfoEntry<H>> {
        self.entries.remove(&id)
    }

    /// Number of idle entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is idle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

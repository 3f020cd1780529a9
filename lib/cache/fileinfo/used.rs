//! Bookkeeping for checked-out entries.

use rustc_hash::FxHashMap;

use super::entry::{EntryId, Inode};

/// Ids of entries currently owned by callers, with the inode each was acquired for.
#[derive(Debug, Default)]
pub struct UsedSet {
    entries: FxHashMap<EntryId, Inode>,
}

impl UsedSet {
    /// Record `id` as checked out.
    pub fn insert(&mut self, id: EntryId, inode: Inode) {
        let previous = self.entries.insert(id, inode);
        debug_assert!(previous.is_none(), "entry {id} checked out twice");
    }

    /// The inode `id` was checked out for, if it is checked out.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<Inode> {
        self.entries.get(&id).copied()
    }

    /// Forget `id`, returning the inode it was checked out for.
    pub fn remove(&mut self, id: EntryId) -> Option<Inode> {
        self.entries.remove(&id)
    }

    /// Number of checked-out entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is checked out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inodes with at least one checked-out entry, sorted and deduplicated.
    #[must_use]
    pub fn inodes(&self) -> Vec<Inode> {
        let mut inodes: Vec<Inode> = self.entries.values().copied().collect();
        inodes.sort_unstable();
        inodes.dedup();
        inodes
    }
}

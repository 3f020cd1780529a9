//! Inode-ordered index over idle entries.

use std::collections::{BTreeMap, VecDeque};

use super::entry::{EntryId, Inode};

/// Multimap from inode to the ids of its idle entries.
///
/// Entries for the same inode are interchangeable, so a lookup only asks whether *some* idle
/// entry exists. Buckets are LIFO: the most recently released entry is handed out first, which
/// leaves older entries at the head of the idle queue to age out.
#[derive(Debug, Default)]
pub struct LookupIndex {
    buckets: BTreeMap<Inode, VecDeque<EntryId>>,
    len: usize,
}

impl LookupIndex {
    /// Index `id` under `inode`.
    pub fn insert(&mut self, inode: Inode, id: EntryId) {
        self.buckets.entry(inode).or_default().push_back(id);
        self.len += 1;
    }

    /// Remove and return any idle entry id for `inode`.
    pub fn take_any(&mut self, inode: Inode) -> Option<EntryId> {
        let bucket = self.buckets.get_mut(&inode)?;
        let id = bucket.pop_back();
        if bucket.is_empty() {
            self.buckets.remove(&inode);
        }
        if id.is_some() {
            self.len -= 1;
        }
        id
    }

    /// Remove the specific `id` indexed under `inode`. Returns `true` if it was present.
    pub fn remove(&mut self, inode: Inode, id: EntryId) -> bool {
        let Some(bucket) = self.buckets.get_mut(&inode) else {
            return false;
        };
        // Reaping removes the globally oldest entry, which sits at the front of its bucket.
        if bucket.front() == Some(&id) {
            bucket.pop_front();
        } else {
            let Some(pos) = bucket.iter().position(|&candidate| candidate == id) else {
                return false;
            };
            bucket.remove(pos);
        }
        if bucket.is_empty() {
            self.buckets.remove(&inode);
        }
        self.len -= 1;
        true
    }

    /// Number of indexed entries across all inodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

//! Cache records pairing an inode with a backing handle.

use std::fmt;

/// Identifier of a filesystem object in the backing filesystem.
pub type Inode = u64;

/// Stable identity of an entry within one [`FileInfoCache`](super::FileInfoCache).
///
/// Ids are unique across every cache in the process and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(super) u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One pooled backing handle for one inode.
///
/// An entry returned by [`FileInfoCache::acquire`](super::FileInfoCache::acquire) is owned by
/// the caller until it is handed back through `release` or `erase`. While the caller holds it,
/// [`attach`](Self::attach) and [`extract`](Self::extract) need no locking.
#[must_use = "an acquired entry must be released or erased"]
pub struct FileInfoEntry<H> {
    pub(super) id: EntryId,
    pub(super) inode: Inode,
    pub(super) handle: Option<H>,
    pub(super) last_timestamp_ms: u64,
    pub(super) in_use: bool,
}

impl<H> FileInfoEntry<H> {
    pub(super) fn new(id: EntryId, inode: Inode, now_ms: u64) -> Self {
        Self {
            id,
            inode,
            handle: None,
            last_timestamp_ms: now_ms,
            in_use: false,
        }
    }

    /// The cache-assigned identity of this entry.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The inode this entry was acquired for.
    #[must_use]
    pub fn inode(&self) -> Inode {
        self.inode
    }

    /// Whether the entry is currently checked out of its cache.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Monotonic time of the last acquire or release, in milliseconds.
    #[must_use]
    pub fn last_timestamp_ms(&self) -> u64 {
        self.last_timestamp_ms
    }

    /// Store `handle` on this entry, returning the previously attached handle, if any.
    pub fn attach(&mut self, handle: H) -> Option<H> {
        self.handle.replace(handle)
    }

    /// The attached handle, or `None` if the backing file was not opened yet.
    #[must_use]
    pub fn extract(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    /// Mutable access to the attached handle.
    #[must_use]
    pub fn extract_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Detach and return the handle, leaving the entry empty.
    pub fn take(&mut self) -> Option<H> {
        self.handle.take()
    }

    /// Free the entry, yielding its handle so the caller can close it.
    ///
    /// Meant for entries returned by [`FileInfoCache::reap`](super::FileInfoCache::reap).
    #[must_use]
    pub fn into_handle(self) -> Option<H> {
        debug_assert!(!self.in_use, "freeing entry {} while in use", self.id);
        self.handle
    }
}

impl<H> fmt::Debug for FileInfoEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInfoEntry")
            .field("id", &self.id)
            .field("inode", &self.inode)
            .field("attached", &self.handle.is_some())
            .field("last_timestamp_ms", &self.last_timestamp_ms)
            .field("in_use", &self.in_use)
            .finish()
    }
}

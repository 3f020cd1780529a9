//! pNFS data-server handles.
//!
//! A [`DataServerHandle`] lives for as long as the NFS server keeps the client's data-server
//! filehandle around. The first I/O on it checks an entry out of the export's
//! [`FileInfoCache`](crate::cache::fileinfo::FileInfoCache), opening the backing file if the entry
//! had no handle yet, and keeps that entry until the handle is dropped. Dropping it returns the
//! entry to the idle pool and reaps a few expired entries.

mod error;
mod wire;

use bytes::Bytes;
use tracing::{debug, error, instrument, trace, warn};

use crate::backing::{BackingFs, OpenFlags};
use crate::cache::clock::{Clock, MonotonicClock};
use crate::cache::fileinfo::{FileInfoEntry, Inode};
use crate::export::Export;

pub use error::{DsError, NfsStatus};
pub use wire::DataServerWire;

/// Expired entries reaped before checking out a new one.
pub const REAP_BEFORE_OPEN: usize = 2;
/// Expired entries reaped after a handle is released.
pub const REAP_AFTER_RELEASE: usize = 5;

/// `stable_how4` of a data-server write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stability {
    /// Data may sit in the backing filesystem's write buffers.
    Unstable,
    /// Data is flushed before replying.
    DataSync,
    /// Data and metadata are flushed before replying.
    FileSync,
}

/// Result of [`DataServerHandle::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsRead {
    /// Bytes read, possibly fewer than requested.
    pub data: Bytes,
    /// Set when nothing was left to read at the requested offset.
    pub eof: bool,
}

/// Result of [`DataServerHandle::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsWrite {
    /// Bytes written.
    pub written: u32,
    /// Stability actually achieved. Downgraded to [`Stability::Unstable`] if the flush failed.
    pub committed: Stability,
}

impl<B: BackingFs, C: Clock> Export<B, C> {
    /// Build a data-server handle from its wire form.
    ///
    /// Nothing is opened here; the backing file is opened on first I/O.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::BadHandle`] if `wire` is not a valid [`DataServerWire`].
    pub fn make_ds_handle(
        &self,
        wire: &[u8],
        big_endian: bool,
    ) -> Result<DataServerHandle<'_, B, C>, DsError> {
        let wire = DataServerWire::decode(wire, big_endian)?;
        trace!(export = self.id(), inode = wire.inode(), "data-server handle created");
        Ok(DataServerHandle {
            export: self,
            inode: wire.inode(),
            entry: None,
        })
    }
}

/// A client's data-server filehandle, bound to one inode of one export.
///
/// Holds at most one checked-out cache entry, which stays attached to the handle between I/O
/// calls and is released when the handle is dropped.
pub struct DataServerHandle<'a, B: BackingFs, C: Clock = MonotonicClock> {
    export: &'a Export<B, C>,
    inode: Inode,
    entry: Option<FileInfoEntry<B::Handle>>,
}

impl<B: BackingFs, C: Clock> DataServerHandle<'_, B, C> {
    /// The inode this handle refers to.
    #[must_use]
    pub fn inode(&self) -> Inode {
        self.inode
    }

    /// Whether a cache entry is currently held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.entry.is_some()
    }

    /// Make sure a cache entry with an open backing handle is held, and return that handle.
    ///
    /// Reuses a pooled handle for the inode when one is idle. A failed open leaves nothing
    /// cached for the inode.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::Open`] if the backing file cannot be opened.
    pub fn open_file(&mut self) -> Result<&B::Handle, DsError> {
        let entry = match self.entry.take() {
            Some(entry) => entry,
            None => self.checkout()?,
        };
        let entry = self.entry.insert(entry);
        entry.extract().ok_or(DsError::NotOpen(self.inode))
    }

    fn checkout(&self) -> Result<FileInfoEntry<B::Handle>, DsError> {
        self.export.clear_expired(REAP_BEFORE_OPEN);

        let cache = self.export.cache();
        let mut entry = cache.acquire(self.inode);
        if entry.extract().is_some() {
            return Ok(entry);
        }

        match self.export.fs().open(self.inode, OpenFlags::RDWR) {
            Ok(handle) => {
                debug!(export = self.export.id(), inode = self.inode, "opened backing file");
                let previous = entry.attach(handle);
                debug_assert!(previous.is_none(), "attached over an open handle");
                Ok(entry)
            }
            Err(source) => {
                debug!(export = self.export.id(), inode = self.inode, error = %source, "open failed");
                let leftover = cache.erase(entry);
                debug_assert!(leftover.is_none(), "erased entry carried a handle");
                Err(DsError::Open {
                    inode: self.inode,
                    source,
                })
            }
        }
    }

    /// Read up to `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::Open`] if the file cannot be opened and [`DsError::Backing`] if the read
    /// fails.
    #[instrument(name = "DataServerHandle::read", skip(self), fields(inode = self.inode))]
    pub fn read(&mut self, offset: u64, len: u32) -> Result<DsRead, DsError> {
        let export = self.export;
        let inode = self.inode;
        let handle = self.open_file()?;
        let data = export
            .fs()
            .read(handle, offset, len)
            .map_err(|source| DsError::Backing { inode, source })?;

        let eof = data.is_empty();
        Ok(DsRead {
            data: Bytes::from(data),
            eof,
        })
    }

    /// Write `data` at `offset`, flushing unless `stability` is [`Stability::Unstable`].
    ///
    /// A failed flush is not an error: the write is reported as unstable instead, and the client
    /// will commit it later.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::Open`] if the file cannot be opened and [`DsError::Backing`] if the
    /// write fails.
    #[instrument(
        name = "DataServerHandle::write",
        skip(self, data),
        fields(inode = self.inode, len = data.len())
    )]
    pub fn write(
        &mut self,
        offset: u64,
        data: &[u8],
        stability: Stability,
    ) -> Result<DsWrite, DsError> {
        let export = self.export;
        let inode = self.inode;
        let handle = self.open_file()?;
        let written = export
            .fs()
            .write(handle, offset, data)
            .map_err(|source| DsError::Backing { inode, source })?;

        let committed = match stability {
            Stability::Unstable => Stability::Unstable,
            requested => match export.fs().flush(handle) {
                Ok(()) => requested,
                Err(e) => {
                    warn!(export = export.id(), inode, error = %e, "flush after write failed");
                    Stability::Unstable
                }
            },
        };

        Ok(DsWrite { written, committed })
    }

    /// Flush previously written data. `offset` and `count` describe the client's commit window;
    /// the whole file is flushed.
    ///
    /// If the file cannot be opened there is nothing of ours to flush and the commit succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DsError::Commit`] if the flush fails.
    #[instrument(name = "DataServerHandle::commit", skip(self), fields(inode = self.inode))]
    pub fn commit(&mut self, offset: u64, count: u32) -> Result<(), DsError> {
        let export = self.export;
        let inode = self.inode;
        let handle = match self.open_file() {
            Ok(handle) => handle,
            Err(e) => {
                debug!(error = %e, "nothing to commit");
                return Ok(());
            }
        };

        export.fs().flush(handle).map_err(|source| {
            error!(export = export.id(), inode, error = %source, "commit failed");
            DsError::Commit { inode, source }
        })
    }

    /// Release the handle. Same as dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl<B: BackingFs, C: Clock> Drop for DataServerHandle<'_, B, C> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.export.cache().release(entry);
        }
        self.export.clear_expired(REAP_AFTER_RELEASE);
    }
}

impl<B: BackingFs, C: Clock> std::fmt::Debug for DataServerHandle<'_, B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataServerHandle")
            .field("export", &self.export.id())
            .field("inode", &self.inode)
            .field("entry", &self.entry)
            .finish()
    }
}

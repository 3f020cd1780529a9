//! The backing distributed filesystem as seen by the data path.
//!
//! The handle cache never talks to the backing filesystem; the data-server glue in
//! [`crate::ds`] does, around acquire/attach/extract/release.

pub mod local;

use bitflags::bitflags;
use thiserror::Error;

use crate::cache::fileinfo::Inode;

bitflags! {
    /// Flags for opening a backing file, similar to Unix open(2) flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ = 1 << 0;
        /// Open for writing.
        const WRITE = 1 << 1;
        /// Create the file if it does not exist.
        const CREATE = 1 << 2;

        /// Open for reading and writing.
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Failures reported by a backing filesystem.
#[derive(Debug, Error)]
pub enum BackingError {
    /// The inode does not exist on the backing filesystem.
    #[error("inode {0} not found")]
    NotFound(Inode),

    /// The handle was opened without the access the operation needs.
    #[error("inode {inode} not opened for {access}")]
    BadAccess {
        /// Inode of the handle.
        inode: Inode,
        /// The missing access, `read` or `write`.
        access: &'static str,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackingError {
    /// The errno equivalent of this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => libc::ENOENT,
            Self::BadAccess { .. } => libc::EBADF,
            Self::Io(e) => e.raw_os_error().unwrap_or_else(|| match e.kind() {
                std::io::ErrorKind::NotFound => libc::ENOENT,
                std::io::ErrorKind::PermissionDenied => libc::EACCES,
                std::io::ErrorKind::StorageFull => libc::ENOSPC,
                _ => libc::EIO,
            }),
        }
    }
}

/// Client API of the backing filesystem.
///
/// Implementations are shared between worker threads; every call may block on network I/O and
/// is therefore never made while the handle cache lock is held.
pub trait BackingFs: Send + Sync {
    /// An open I/O context for one inode.
    type Handle: Send;

    /// Open `inode` with `flags`.
    fn open(&self, inode: Inode, flags: OpenFlags) -> Result<Self::Handle, BackingError>;

    /// Read up to `len` bytes at `offset`. A short or empty result means end of file.
    fn read(&self, handle: &Self::Handle, offset: u64, len: u32) -> Result<Vec<u8>, BackingError>;

    /// Write `data` at `offset`, returning the number of bytes written.
    fn write(&self, handle: &Self::Handle, offset: u64, data: &[u8]) -> Result<u32, BackingError>;

    /// Make previously written data durable.
    fn flush(&self, handle: &Self::Handle) -> Result<(), BackingError>;

    /// Close `handle`, releasing its I/O context.
    fn close(&self, handle: Self::Handle) -> Result<(), BackingError>;
}

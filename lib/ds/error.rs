//! Data-server errors and their NFSv4 status codes.

use thiserror::Error;

use crate::backing::BackingError;
use crate::cache::fileinfo::Inode;

/// The subset of NFSv4 `nfsstat4` codes the data server replies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NfsStatus {
    /// `NFS4_OK`
    Ok = 0,
    /// `NFS4ERR_PERM`
    Perm = 1,
    /// `NFS4ERR_NOENT`
    NoEnt = 2,
    /// `NFS4ERR_IO`
    Io = 5,
    /// `NFS4ERR_ACCESS`
    Access = 13,
    /// `NFS4ERR_INVAL`
    Inval = 22,
    /// `NFS4ERR_FBIG`
    FBig = 27,
    /// `NFS4ERR_NOSPC`
    NoSpc = 28,
    /// `NFS4ERR_ROFS`
    RoFs = 30,
    /// `NFS4ERR_DQUOT`
    DQuot = 69,
    /// `NFS4ERR_BADHANDLE`
    BadHandle = 10001,
}

impl NfsStatus {
    /// Translate an errno reported by the backing filesystem.
    #[must_use]
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            0 => Self::Ok,
            libc::EPERM => Self::Perm,
            libc::ENOENT => Self::NoEnt,
            libc::EACCES => Self::Access,
            libc::EINVAL => Self::Inval,
            libc::EFBIG => Self::FBig,
            libc::ENOSPC => Self::NoSpc,
            libc::EROFS => Self::RoFs,
            libc::EDQUOT => Self::DQuot,
            _ => Self::Io,
        }
    }

    /// The numeric `nfsstat4` value.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Failures of data-server operations.
#[derive(Debug, Error)]
pub enum DsError {
    /// The client presented a handle this server cannot have issued.
    #[error("bad data-server handle: {0}")]
    BadHandle(&'static str),

    /// Opening the backing file failed; no cache entry was kept for it.
    #[error("failed to open inode {inode}: {source}")]
    Open {
        /// Inode the operation targeted.
        inode: Inode,
        /// Failure reported by the backing filesystem.
        #[source]
        source: BackingError,
    },

    /// A read or write against the backing file failed.
    #[error("I/O on inode {inode} failed: {source}")]
    Backing {
        /// Inode the operation targeted.
        inode: Inode,
        /// Failure reported by the backing filesystem.
        #[source]
        source: BackingError,
    },

    /// The held cache entry carries no backing handle.
    #[error("inode {0} has no open backing handle")]
    NotOpen(Inode),

    /// Flushing on commit failed.
    #[error("commit of inode {inode} failed: {source}")]
    Commit {
        /// Inode the operation targeted.
        inode: Inode,
        /// Failure reported by the backing filesystem.
        #[source]
        source: BackingError,
    },
}

impl DsError {
    /// The status to reply with.
    #[must_use]
    pub fn nfs_status(&self) -> NfsStatus {
        match self {
            Self::BadHandle(_) => NfsStatus::BadHandle,
            Self::Open { .. } | Self::NotOpen(_) => NfsStatus::Io,
            Self::Backing { source, .. } => NfsStatus::from_errno(source.errno()),
            Self::Commit { .. } => NfsStatus::Inval,
        }
    }
}

//! Directory-backed [`BackingFs`]: inode `N` lives in the file `<root>/<N>`.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BackingError, BackingFs, OpenFlags};
use crate::cache::fileinfo::Inode;

/// An open file of a [`LocalBackingFs`].
#[derive(Debug)]
pub struct LocalFile {
    inode: Inode,
    flags: OpenFlags,
    file: File,
}

impl LocalFile {
    /// The inode this file was opened for.
    #[must_use]
    pub fn inode(&self) -> Inode {
        self.inode
    }

    fn require(&self, flag: OpenFlags, access: &'static str) -> Result<(), BackingError> {
        if self.flags.contains(flag) {
            Ok(())
        } else {
            Err(BackingError::BadAccess {
                inode: self.inode,
                access,
            })
        }
    }
}

/// Backing filesystem stored as one plain file per inode in a local directory.
#[derive(Debug, Clone)]
pub struct LocalBackingFs {
    root: PathBuf,
}

impl LocalBackingFs {
    /// Serve inodes from `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BackingError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory inodes are stored in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `inode`.
    #[must_use]
    pub fn inode_path(&self, inode: Inode) -> PathBuf {
        self.root.join(inode.to_string())
    }
}

impl BackingFs for LocalBackingFs {
    type Handle = LocalFile;

    fn open(&self, inode: Inode, flags: OpenFlags) -> Result<LocalFile, BackingError> {
        let path = self.inode_path(inode);
        let file = OpenOptions::new()
            .read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .create(flags.contains(OpenFlags::CREATE | OpenFlags::WRITE))
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackingError::NotFound(inode)
                } else {
                    BackingError::Io(e)
                }
            })?;
        debug!(inode, ?flags, path = %path.display(), "opened backing file");
        Ok(LocalFile { inode, flags, file })
    }

    fn read(&self, handle: &LocalFile, offset: u64, len: u32) -> Result<Vec<u8>, BackingError> {
        handle.require(OpenFlags::READ, "read")?;
        // Never allocate past the end of the file, whatever count the client asked for.
        let remaining = handle.file.metadata()?.len().saturating_sub(offset);
        let want = u32::try_from(remaining).map_or(len, |r| r.min(len));
        let mut buf = vec![0; want as usize];
        let mut filled = 0;
        while filled < buf.len() {
            match handle
                .file
                .read_at(&mut buf[filled..], offset + filled as u64)
            {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "write lengths come from a u32 protocol count"
    )]
    fn write(&self, handle: &LocalFile, offset: u64, data: &[u8]) -> Result<u32, BackingError> {
        handle.require(OpenFlags::WRITE, "write")?;
        handle.file.write_all_at(data, offset)?;
        Ok(data.len() as u32)
    }

    fn flush(&self, handle: &LocalFile) -> Result<(), BackingError> {
        handle.file.sync_data()?;
        Ok(())
    }

    fn close(&self, handle: LocalFile) -> Result<(), BackingError> {
        debug!(inode = handle.inode, "closing backing file");
        drop(handle.file);
        Ok(())
    }
}

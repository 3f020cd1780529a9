#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dsgate::backing::{BackingError, BackingFs, OpenFlags};
use dsgate::cache::clock::ManualClock;
use dsgate::cache::fileinfo::{FileInfoCache, Inode};
use dsgate::config::FileInfoCacheConfig;
use dsgate::export::Export;

/// Handle type for cache-only tests: the inode it was opened for plus a unique serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockHandle {
    pub inode: Inode,
    pub serial: u64,
}

/// Cache with a manual clock starting at 0 ms.
pub fn manual_cache(
    capacity: usize,
    min_idle_ms: u64,
) -> (FileInfoCache<MockHandle, ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    let cache = FileInfoCache::with_clock(
        capacity,
        Duration::from_millis(min_idle_ms),
        clock.clone(),
    );
    (cache, clock)
}

/// In-memory backing filesystem that counts opens and closes and can be told to fail.
///
/// Clones share state, so a test can keep one while an export owns another.
#[derive(Clone, Default)]
pub struct MockBackingFs {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    files: Mutex<HashMap<Inode, Vec<u8>>>,
    open_handles: Mutex<HashSet<u64>>,
    next_serial: AtomicU64,
    opens: AtomicU64,
    closes: AtomicU64,
    flushes: AtomicU64,
    failing_opens: Mutex<HashSet<Inode>>,
    fail_flush: AtomicBool,
}

impl MockBackingFs {
    /// A filesystem holding an empty file for each inode in `inodes`.
    pub fn with_files(inodes: impl IntoIterator<Item = Inode>) -> Self {
        let fs = Self::default();
        {
            let mut files = fs.inner.files.lock().unwrap();
            for inode in inodes {
                files.insert(inode, Vec::new());
            }
        }
        fs
    }

    pub fn fail_open(&self, inode: Inode) {
        self.inner.failing_opens.lock().unwrap().insert(inode);
    }

    pub fn set_fail_flush(&self, fail: bool) {
        self.inner.fail_flush.store(fail, Ordering::Relaxed);
    }

    pub fn opens(&self) -> u64 {
        self.inner.opens.load(Ordering::Relaxed)
    }

    pub fn closes(&self) -> u64 {
        self.inner.closes.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.inner.flushes.load(Ordering::Relaxed)
    }

    /// Handles opened and not yet closed.
    pub fn open_count(&self) -> usize {
        self.inner.open_handles.lock().unwrap().len()
    }

    pub fn contents(&self, inode: Inode) -> Vec<u8> {
        self.inner
            .files
            .lock()
            .unwrap()
            .get(&inode)
            .cloned()
            .unwrap_or_default()
    }
}

impl BackingFs for MockBackingFs {
    type Handle = MockHandle;

    fn open(&self, inode: Inode, _flags: OpenFlags) -> Result<MockHandle, BackingError> {
        if self.inner.failing_opens.lock().unwrap().contains(&inode)
            || !self.inner.files.lock().unwrap().contains_key(&inode)
        {
            return Err(BackingError::NotFound(inode));
        }
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        self.inner.opens.fetch_add(1, Ordering::Relaxed);
        self.inner.open_handles.lock().unwrap().insert(serial);
        Ok(MockHandle { inode, serial })
    }

    fn read(&self, handle: &MockHandle, offset: u64, len: u32) -> Result<Vec<u8>, BackingError> {
        let files = self.inner.files.lock().unwrap();
        let data = files
            .get(&handle.inode)
            .ok_or(BackingError::NotFound(handle.inode))?;
        let start = usize::try_from(offset).unwrap().min(data.len());
        let end = (start + len as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn write(&self, handle: &MockHandle, offset: u64, buf: &[u8]) -> Result<u32, BackingError> {
        let mut files = self.inner.files.lock().unwrap();
        let data = files
            .get_mut(&handle.inode)
            .ok_or(BackingError::NotFound(handle.inode))?;
        let start = usize::try_from(offset).unwrap();
        if data.len() < start + buf.len() {
            data.resize(start + buf.len(), 0);
        }
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(u32::try_from(buf.len()).unwrap())
    }

    fn flush(&self, _handle: &MockHandle) -> Result<(), BackingError> {
        self.inner.flushes.fetch_add(1, Ordering::Relaxed);
        if self.inner.fail_flush.load(Ordering::Relaxed) {
            return Err(BackingError::Io(std::io::Error::other("flush failed")));
        }
        Ok(())
    }

    fn close(&self, handle: MockHandle) -> Result<(), BackingError> {
        self.inner.closes.fetch_add(1, Ordering::Relaxed);
        assert!(
            self.inner.open_handles.lock().unwrap().remove(&handle.serial),
            "handle {handle:?} closed twice"
        );
        Ok(())
    }
}

/// Export over a [`MockBackingFs`] driven by a manual clock.
pub fn mock_export(
    fs: MockBackingFs,
    max_size: u32,
    timeout_secs: u32,
) -> (Export<MockBackingFs, ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    let config = FileInfoCacheConfig {
        timeout_secs,
        max_size,
    };
    (Export::with_clock(1, fs, &config, clock.clone()), clock)
}

//! One exported backing filesystem together with its open-handle cache.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backing::BackingFs;
use crate::cache::clock::{Clock, MonotonicClock};
use crate::cache::fileinfo::{CacheStats, FileInfoCache};
use crate::config::FileInfoCacheConfig;

/// Identifier of an export, as carried in log lines.
pub type ExportId = u16;

/// A backing filesystem instance and the handle cache serving its data path.
///
/// Each export owns its own [`FileInfoCache`]; nothing is shared between exports.
pub struct Export<B: BackingFs, C: Clock = MonotonicClock> {
    id: ExportId,
    fs: B,
    cache: FileInfoCache<B::Handle, C>,
}

impl<B: BackingFs> Export<B> {
    /// Create an export serving `fs`, with a cache sized by `config`.
    #[must_use]
    pub fn new(id: ExportId, fs: B, config: &FileInfoCacheConfig) -> Self {
        Self::with_clock(id, fs, config, MonotonicClock::new())
    }
}

impl<B: BackingFs, C: Clock> Export<B, C> {
    /// Create an export whose cache reads time from `clock`.
    #[must_use]
    pub fn with_clock(id: ExportId, fs: B, config: &FileInfoCacheConfig, clock: C) -> Self {
        debug!(
            export = id,
            capacity = config.capacity(),
            timeout_secs = config.timeout_secs,
            "creating export"
        );
        Self {
            id,
            fs,
            cache: FileInfoCache::with_clock(config.capacity(), config.min_idle(), clock),
        }
    }

    /// The export identifier.
    #[must_use]
    pub fn id(&self) -> ExportId {
        self.id
    }

    /// The backing filesystem.
    #[must_use]
    pub fn fs(&self) -> &B {
        &self.fs
    }

    /// The open-handle cache.
    #[must_use]
    pub fn cache(&self) -> &FileInfoCache<B::Handle, C> {
        &self.cache
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Apply reloaded cache settings. Nothing is closed until the next reap.
    pub fn apply_config(&self, config: &FileInfoCacheConfig) {
        info!(
            export = self.id,
            capacity = config.capacity(),
            timeout_secs = config.timeout_secs,
            "applying fileinfo cache settings"
        );
        self.cache.reconfigure(config.capacity(), config.min_idle());
    }

    /// Reap up to `count` due entries, closing their backing handles.
    ///
    /// Close failures are logged and otherwise ignored; the entry is gone either way. Returns the
    /// number of entries reaped.
    pub fn clear_expired(&self, count: usize) -> usize {
        let mut reaped = 0;
        while reaped < count {
            let Some(entry) = self.cache.reap() else {
                break;
            };
            let inode = entry.inode();
            if let Some(handle) = entry.into_handle()
                && let Err(e) = self.fs.close(handle)
            {
                warn!(export = self.id, inode, error = %e, "failed to close reaped handle");
            }
            reaped += 1;
        }
        reaped
    }

    /// Close every cached handle and tear the cache down.
    ///
    /// # Panics
    ///
    /// Panics if a data-server handle still holds a cache entry.
    pub fn shutdown(self) {
        self.cache.reconfigure(0, Duration::ZERO);
        let drained = self.clear_expired(usize::MAX);

        let Self { id, fs, cache } = self;
        let leftover = cache.destroy();
        let leftover_count = leftover.len();
        for handle in leftover {
            if let Err(e) = fs.close(handle) {
                warn!(export = id, error = %e, "failed to close handle during shutdown");
            }
        }
        info!(
            export = id,
            closed = drained + leftover_count,
            "export shut down"
        );
    }
}

//! Inode-keyed pool of open backing file handles.
//!
//! Opening a file against the backing filesystem costs a round trip to its storage nodes, while
//! the data path sees the same inodes over and over from many concurrent requests. The
//! [`FileInfoCache`] keeps already-opened handles around between requests and bounds how many
//! stay resident:
//!
//! 1. [`acquire`](FileInfoCache::acquire) hands out an idle entry for the inode, or a fresh empty
//!    one. The caller owns it exclusively and opens the backing file itself if
//!    [`extract`](FileInfoEntry::extract) is empty, outside of any cache lock.
//! 2. [`release`](FileInfoCache::release) returns the entry, handle still attached, to the idle
//!    pool. [`erase`](FileInfoCache::erase) discards it instead, e.g. after a failed open.
//! 3. [`reap`](FileInfoCache::reap) pops the longest-idle entry once it served its grace period,
//!    or immediately while the cache holds more entries than its capacity. The caller closes the
//!    returned handle.
//!
//! Capacity is soft: acquire never fails or blocks because the pool is full. Being over capacity
//! only drops the grace period to zero, so subsequent reaps drain idle entries back down.
//!
//! Checked-out entries are moved out of the cache, so two callers can never hold the same entry.
//! Handing back an entry that is not checked out of this cache is a bug in the caller and panics.

pub mod entry;
mod idle;
mod index;
mod used;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, trace};

use crate::cache::clock::{Clock, MonotonicClock};
use crate::sync::{Mutex, lock};

pub use entry::{EntryId, FileInfoEntry, Inode};
use idle::IdleQueue;
use index::LookupIndex;
use used::UsedSet;

/// Shared by every cache in the process, so an entry id names exactly one cache.
static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Point-in-time counters of a [`FileInfoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Live entries, idle and checked out.
    pub entries: usize,
    /// Entries waiting in the idle pool.
    pub idle: usize,
    /// Entries currently owned by callers.
    pub used: usize,
    /// Acquires served by an idle entry.
    pub hits: u64,
    /// Acquires that had to allocate a new entry.
    pub misses: u64,
    /// Entries handed out by reap.
    pub evictions: u64,
    /// Entries discarded through erase.
    pub erased: u64,
    /// Soft limit on `entries`.
    pub capacity: usize,
    /// Grace period applied while under capacity.
    pub min_idle: Duration,
}

struct State<H> {
    idle: IdleQueue<H>,
    index: LookupIndex,
    used: UsedSet,
    entry_count: usize,
    capacity: usize,
    min_idle_ms: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    erased: u64,
}

impl<H> State<H> {
    fn new(capacity: usize, min_idle_ms: u64) -> Self {
        Self {
            idle: IdleQueue::default(),
            index: LookupIndex::default(),
            used: UsedSet::default(),
            entry_count: 0,
            capacity,
            min_idle_ms,
            hits: 0,
            misses: 0,
            evictions: 0,
            erased: 0,
        }
    }

    fn allocate(&mut self, inode: Inode, now_ms: u64) -> FileInfoEntry<H> {
        let id = EntryId(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed));
        self.entry_count += 1;
        FileInfoEntry::new(id, inode, now_ms)
    }

    /// Grace period for the next reap: none at all while over capacity.
    fn effective_timeout_ms(&self) -> u64 {
        if self.entry_count > self.capacity {
            0
        } else {
            self.min_idle_ms
        }
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.index.len(),
            self.idle.len(),
            "lookup index out of sync with idle queue"
        );
        debug_assert_eq!(self.index.is_empty(), self.idle.is_empty());
        debug_assert_eq!(
            self.idle.len() + self.used.len(),
            self.entry_count,
            "entry count drifted"
        );
    }

    /// Panics unless `entry` is checked out of this cache. Touches no state.
    fn assert_checked_out(&self, entry: &FileInfoEntry<H>, op: &str) {
        assert!(
            entry.in_use,
            "{op} of entry {} (inode {}) which is not in use",
            entry.id, entry.inode
        );
        assert_eq!(
            self.used.get(entry.id),
            Some(entry.inode),
            "{op} of entry {} (inode {}) not checked out of this cache",
            entry.id,
            entry.inode
        );
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A bounded, concurrent pool of open backing handles keyed by inode.
///
/// `H` is the backing handle type; the cache never inspects or closes it. `C` supplies the
/// monotonic time used for the reap grace period.
pub struct FileInfoCache<H, C = MonotonicClock> {
    state: Mutex<State<H>>,
    clock: C,
}

impl<H> FileInfoCache<H> {
    /// Create an empty cache holding roughly `capacity` entries, keeping idle ones for at least
    /// `min_idle` while under capacity.
    #[must_use]
    pub fn new(capacity: usize, min_idle: Duration) -> Self {
        Self::with_clock(capacity, min_idle, MonotonicClock::new())
    }
}

impl<H, C: Clock> FileInfoCache<H, C> {
    /// Create an empty cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(capacity: usize, min_idle: Duration, clock: C) -> Self {
        Self {
            state: Mutex::new(State::new(capacity, duration_to_ms(min_idle))),
            clock,
        }
    }

    /// Replace the capacity and grace period. Applies from the next [`reap`](Self::reap) on;
    /// nothing is evicted by this call.
    pub fn reconfigure(&self, capacity: usize, min_idle: Duration) {
        let mut state = lock(&self.state);
        state.capacity = capacity;
        state.min_idle_ms = duration_to_ms(min_idle);
        debug!(
            capacity,
            min_idle_ms = state.min_idle_ms,
            entries = state.entry_count,
            "fileinfo cache reconfigured"
        );
    }

    /// Check out an entry for `inode`.
    ///
    /// Reuses an idle entry for the same inode if there is one, otherwise allocates an entry with
    /// no handle attached. Never fails because of capacity.
    pub fn acquire(&self, inode: Inode) -> FileInfoEntry<H> {
        let mut state = lock(&self.state);
        let now_ms = self.clock.now_ms();

        let reused = state
            .index
            .take_any(inode)
            .and_then(|id| state.idle.remove(id));
        let mut entry = match reused {
            Some(entry) => {
                debug_assert!(!entry.in_use, "idle entry {} marked in use", entry.id);
                state.hits += 1;
                trace!(inode, entry = %entry.id, "fileinfo cache hit");
                entry
            }
            None => {
                state.misses += 1;
                let entry = state.allocate(inode, now_ms);
                trace!(inode, entry = %entry.id, entries = state.entry_count, "fileinfo cache miss");
                entry
            }
        };

        entry.in_use = true;
        entry.inode = inode;
        entry.last_timestamp_ms = now_ms;
        state.used.insert(entry.id, inode);
        state.debug_check();
        entry
    }

    /// Return a checked-out entry to the idle pool, keeping its handle attached.
    ///
    /// # Panics
    ///
    /// Panics if `entry` is not checked out of this cache.
    pub fn release(&self, mut entry: FileInfoEntry<H>) {
        let mut state = lock(&self.state);
        let now_ms = self.clock.now_ms();
        state.assert_checked_out(&entry, "release");
        state.used.remove(entry.id);

        entry.in_use = false;
        entry.last_timestamp_ms = now_ms;
        trace!(inode = entry.inode, entry = %entry.id, "fileinfo entry released");
        state.index.insert(entry.inode, entry.id);
        state.idle.push_back(entry);
        state.debug_check();
    }

    /// Discard a checked-out entry instead of pooling it.
    ///
    /// The cache does not close anything: a handle still attached is returned so the caller can
    /// close it.
    ///
    /// # Panics
    ///
    /// Panics if `entry` is not checked out of this cache.
    #[must_use = "an attached handle must be closed by the caller"]
    pub fn erase(&self, mut entry: FileInfoEntry<H>) -> Option<H> {
        let mut state = lock(&self.state);
        state.assert_checked_out(&entry, "erase");
        state.used.remove(entry.id);

        state.entry_count -= 1;
        state.erased += 1;
        trace!(inode = entry.inode, entry = %entry.id, entries = state.entry_count, "fileinfo entry erased");
        state.debug_check();
        drop(state);

        entry.in_use = false;
        entry.take()
    }

    /// Evict the longest-idle entry if it is due.
    ///
    /// The entry is due once it has been idle for the grace period, or right away while the
    /// cache holds more entries than its capacity. Returns `None` when the oldest idle entry is
    /// not due yet, since every other idle entry was released after it.
    ///
    /// The caller closes the handle of the returned entry, see
    /// [`FileInfoEntry::into_handle`].
    pub fn reap(&self) -> Option<FileInfoEntry<H>> {
        let mut state = lock(&self.state);
        let now_ms = self.clock.now_ms();

        let timeout_ms = state.effective_timeout_ms();
        let (id, inode) = {
            let oldest = state.idle.front()?;
            if now_ms.saturating_sub(oldest.last_timestamp_ms) < timeout_ms {
                return None;
            }
            (oldest.id, oldest.inode)
        };

        let entry = state.idle.pop_front();
        let indexed = state.index.remove(inode, id);
        debug_assert!(indexed, "idle entry {id} missing from lookup index");
        state.entry_count -= 1;
        state.evictions += 1;
        trace!(inode, entry = %id, timeout_ms, entries = state.entry_count, "fileinfo entry reaped");
        state.debug_check();
        entry
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            entries: state.entry_count,
            idle: state.idle.len(),
            used: state.used.len(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            erased: state.erased,
            capacity: state.capacity,
            min_idle: Duration::from_millis(state.min_idle_ms),
        }
    }

    /// Tear the cache down, handing back every handle still attached to an idle entry, oldest
    /// first, so the caller can close them.
    ///
    /// # Panics
    ///
    /// Panics if any entry is still checked out.
    #[must_use = "returned handles must be closed by the caller"]
    pub fn destroy(self) -> Vec<H> {
        let mut state = self
            .state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(
            state.used.is_empty(),
            "destroying fileinfo cache with {} entries still in use (inodes {:?})",
            state.used.len(),
            state.used.inodes()
        );

        let mut handles = Vec::with_capacity(state.idle.len());
        while let Some(entry) = state.idle.pop_front() {
            handles.extend(entry.into_handle());
        }
        debug!(
            closed = handles.len(),
            entries = state.entry_count,
            "fileinfo cache destroyed"
        );
        handles
    }
}

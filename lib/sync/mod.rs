//! Synchronization primitives.
//!
//! Shims between loom and std synchronization primitives, so the handle cache can be model
//! checked with `RUSTFLAGS="--cfg loom"`.

#[cfg(loom)]
pub use loom::sync::{Mutex, MutexGuard};

#[cfg(not(loom))]
pub use std::sync::{Mutex, MutexGuard};

/// Lock `mutex`, recovering the guard if a previous holder panicked.
///
/// Misuse assertions in the cache fire before any state is touched, so the protected state stays
/// consistent even when the lock is poisoned.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

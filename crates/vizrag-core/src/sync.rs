//! Mutex helpers for shared test doubles.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that recovers from lock poisoning.
///
/// A poisoned lock only means another holder panicked; the guarded data of
/// the mocks and recorders in this workspace stays usable.
pub trait IgnoreLock<T> {
    /// Lock the mutex, taking the inner guard if it was poisoned.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

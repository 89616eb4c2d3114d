use crate::{RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// A value guarded by a raw lock `R`.
///
/// The raw lock decides the lock domain: [`RawSpin`](crate::RawSpin) for task
/// context, [`RawTicket`](crate::RawTicket) for the ISR domain.
pub struct Mutex<T, R> {
    raw: R,
    value: UnsafeCell<T>,
}

// SAFETY: the raw lock serialises every access to `value`, so sharing the
// mutex only ever moves `T` between threads.
unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    #[must_use]
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            value: UnsafeCell::new(value),
        }
    }

    /// Exclusive access through `&mut self`; no locking needed.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Spin until the lock is ours. Dropping the guard releases it.
    #[inline]
    #[must_use = "the lock is released as soon as the guard is dropped"]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.raw_lock();
        MutexGuard { mutex: self }
    }

    /// One attempt, no waiting.
    #[inline]
    #[must_use = "the lock is released as soon as the guard is dropped"]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.raw_try_lock().then(|| MutexGuard { mutex: self })
    }

    /// Run `f` with the lock held.
    #[inline]
    pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        f(&mut self.lock())
    }

    /// Lock state at the time of the call; diagnostics only.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.raw_is_locked()
    }
}

impl<T: fmt::Debug, R: RawLock + RawUnlock> fmt::Debug for Mutex<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(g) => d.field("value", &*g),
            None => d.field("value", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// Holds the lock until dropped.
pub struct MutexGuard<'a, T, R: RawUnlock> {
    mutex: &'a Mutex<T, R>,
}

impl<T, R: RawUnlock> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T, R: RawUnlock> DerefMut for MutexGuard<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held, and `&mut self` makes
        // this the only reference handed out through it.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T, R: RawUnlock> Drop for MutexGuard<'_, T, R> {
    fn drop(&mut self) {
        // SAFETY: this guard is the lock holder.
        unsafe { self.mutex.raw.raw_unlock() }
    }
}

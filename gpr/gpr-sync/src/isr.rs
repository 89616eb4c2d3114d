//! ISR lock domain.
//!
//! [`Mutex::lock_isr`] pairs an [`IsrGuard`] with a regular [`MutexGuard`].
//! It
//!
//! 1. saves the current interrupt state and masks interrupts (only with the
//!    `irq-mask` feature on `x86_64`), and
//! 2. acquires the underlying mutex,
//!
//! releasing the mutex first and restoring the interrupt state last.
//!
//! Packet pools are taken through this path so that a receive handler running
//! at interrupt priority cannot preempt an allocation on the same core and
//! spin forever on a lock its own core holds.
//!
//! # Privilege
//!
//! With `irq-mask` the guard issues `cli`/`sti`, which is only legal in ring 0
//! (or a suitable hypervisor context). Hosted builds leave the feature off.

use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use core::ops::{Deref, DerefMut};

/// Mutex guard that also keeps interrupts masked while held.
pub struct IsrMutexGuard<'a, T, R: RawLock + RawUnlock> {
    // Field order is drop order: unlock, then restore interrupts.
    g: MutexGuard<'a, T, R>,
    _isr: IsrGuard,
}

impl<T, R: RawLock + RawUnlock> Deref for IsrMutexGuard<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.g
    }
}

impl<T, R: RawLock + RawUnlock> DerefMut for IsrMutexGuard<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.g
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquires the mutex with interrupts masked for the guard's lifetime.
    #[inline]
    #[must_use = "the lock is released as soon as the guard is dropped"]
    pub fn lock_isr(&self) -> IsrMutexGuard<'_, T, R> {
        let isr = IsrGuard::new();
        let g = self.lock();
        IsrMutexGuard { g, _isr: isr }
    }

    /// Closure convenience over [`lock_isr`](Self::lock_isr).
    #[inline]
    pub fn with_isr_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        let mut g = self.lock_isr();
        f(&mut g)
    }
}

#[cfg(all(feature = "irq-mask", target_arch = "x86_64"))]
mod arch {
    /// Bit 9 of `RFLAGS`.
    const IF: u64 = 1 << 9;

    #[inline]
    pub fn save_and_mask() -> bool {
        let r: u64;
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags));
        }
        let enabled = r & IF != 0;
        if enabled {
            unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
        }
        enabled
    }

    #[inline]
    pub fn restore(were_enabled: bool) {
        if were_enabled {
            unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
        }
    }
}

#[cfg(not(all(feature = "irq-mask", target_arch = "x86_64")))]
mod arch {
    #[inline]
    pub const fn save_and_mask() -> bool {
        false
    }

    #[inline]
    pub const fn restore(_were_enabled: bool) {}
}

/// RAII guard that masks interrupts on creation and restores them on drop.
///
/// Interrupts are re-enabled on drop **only** if they were enabled when the
/// guard was created, so nested guards compose.
pub struct IsrGuard {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Default for IsrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IsrGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            were_enabled: arch::save_and_mask(),
        }
    }

    /// Whether this guard actually masked interrupts.
    #[inline]
    #[must_use]
    pub const fn masked(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        arch::restore(self.were_enabled);
    }
}

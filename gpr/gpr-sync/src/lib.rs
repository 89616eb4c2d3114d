//! # GPR synchronization primitives
//!
//! The packet router distinguishes two mutual-exclusion domains:
//!
//! ```text
//! ┌──────────────────────────────┐    ┌──────────────────────────────┐
//! │ Task lock  (TaskMutex<T>)    │    │ ISR lock  (IsrMutex<T>)      │
//! │  • session registries        │    │  • packet pool free lists    │
//! │  • register / deregister     │    │  • dynamic packet tracking   │
//! │  • port lookup               │    │  • packet log ring           │
//! │  test-and-set spin           │    │  FIFO ticket, optional IRQ   │
//! │                              │    │  masking via `lock_isr`      │
//! └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Packet release may happen on a high-priority receive path, so the pool
//! structures live behind the ISR lock. Both locks are only ever held for
//! list manipulation; nothing in the router performs I/O or invokes a
//! callback while holding one.
//!
//! With the `irq-mask` feature enabled on `x86_64`, [`Mutex::lock_isr`] saves
//! and clears the interrupt flag before acquiring the lock. Without it the
//! ISR lock is a plain ticket lock, which is what hosted builds and tests use.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod isr;
mod mutex;
mod raw;

pub use isr::{IsrGuard, IsrMutexGuard};
pub use mutex::{Mutex, MutexGuard};
pub use raw::{RawSpin, RawTicket};

/// Lock for task-context bookkeeping (session registries).
pub type TaskMutex<T> = Mutex<T, RawSpin>;

/// Lock for state that may be touched from the receive/interrupt path
/// (packet pools). Acquire it through [`Mutex::lock_isr`].
pub type IsrMutex<T> = Mutex<T, RawTicket>;

impl<T> TaskMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T> IsrMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

/// Acquire side of a raw lock.
pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    fn raw_is_locked(&self) -> bool;
}

/// Release side of a raw lock.
pub trait RawUnlock {
    /// # Safety
    /// Must only be called by the holder of the lock.
    unsafe fn raw_unlock(&self);
}

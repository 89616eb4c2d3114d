//! Raw lock words.
//!
//! Both locks busy-wait. Critical sections in the router only splice list
//! links, so a waiter is expected to get in within a few hundred cycles; the
//! [`Backoff`] keeps contended waiters off the cache line in the meantime.

use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Exponential pause between polls of a contended lock word, capped at
/// `2^MAX_STEP` spin hints.
struct Backoff {
    step: u32,
}

impl Backoff {
    const MAX_STEP: u32 = 6;

    const fn new() -> Self {
        Self { step: 0 }
    }

    #[inline]
    fn snooze(&mut self) {
        for _ in 0..1u32 << self.step {
            spin_loop();
        }
        if self.step < Self::MAX_STEP {
            self.step += 1;
        }
    }
}

/// Test-and-test-and-set lock backing [`TaskMutex`](crate::TaskMutex).
#[derive(Default)]
pub struct RawSpin {
    held: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        let mut backoff = Backoff::new();
        while !self.acquire() {
            // Poll with plain loads until the holder lets go.
            while self.held.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn raw_is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

/// FIFO ticket lock backing [`IsrMutex`](crate::IsrMutex).
///
/// One word holds both counters: the next ticket to hand out in the upper
/// half, the ticket being served in the lower half. Waiters are served in
/// arrival order, so a burst of releases from the receive path cannot starve
/// an allocating task.
#[derive(Default)]
pub struct RawTicket {
    word: AtomicU32,
}

const TICKET: u32 = 1 << 16;
const SERVING: u32 = TICKET - 1;

#[inline]
const fn next_of(word: u32) -> u32 {
    word >> 16
}

#[inline]
const fn serving_of(word: u32) -> u32 {
    word & SERVING
}

impl RawTicket {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
        }
    }
}

impl RawLock for RawTicket {
    fn raw_lock(&self) {
        // The upper half wraps on its own: the carry leaves the word.
        let ticket = next_of(self.word.fetch_add(TICKET, Ordering::Relaxed));
        let mut backoff = Backoff::new();
        while serving_of(self.word.load(Ordering::Acquire)) != ticket {
            backoff.snooze();
        }
    }

    fn raw_try_lock(&self) -> bool {
        let word = self.word.load(Ordering::Relaxed);
        next_of(word) == serving_of(word)
            && self
                .word
                .compare_exchange(word, word.wrapping_add(TICKET), Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    fn raw_is_locked(&self) -> bool {
        let word = self.word.load(Ordering::Relaxed);
        next_of(word) != serving_of(word)
    }
}

impl RawUnlock for RawTicket {
    unsafe fn raw_unlock(&self) {
        // Bump the lower half without carrying into the ticket counter;
        // waiters may take tickets concurrently, hence the CAS loop.
        let mut word = self.word.load(Ordering::Relaxed);
        loop {
            let served = (word & !SERVING) | ((serving_of(word) + 1) & SERVING);
            match self
                .word
                .compare_exchange_weak(word, served, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => word = current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_counters_wrap_independently() {
        let t = RawTicket {
            word: AtomicU32::new(0xFFFF_FFFF),
        };
        // next 0xFFFF, serving 0xFFFF: free
        assert!(!t.raw_is_locked());
        assert!(t.raw_try_lock());
        assert_eq!(t.word.load(Ordering::Relaxed), 0x0000_FFFF);
        assert!(t.raw_is_locked());
        unsafe { t.raw_unlock() };
        assert_eq!(t.word.load(Ordering::Relaxed), 0);
        assert!(!t.raw_is_locked());
    }

    #[test]
    fn spin_try_lock() {
        let s = RawSpin::new();
        assert!(s.raw_try_lock());
        assert!(!s.raw_try_lock());
        unsafe { s.raw_unlock() };
        assert!(!s.raw_is_locked());
    }
}

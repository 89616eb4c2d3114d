//! Ring of recently routed cross-domain packet headers.

use crate::config::Clock;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use gpr_packet::{HEADER_WORDS, Packet};
use gpr_sync::IsrMutex;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: u64,
    pub direction: Direction,
    pub header: [u32; HEADER_WORDS as usize],
}

struct Ring {
    entries: Vec<LogEntry>,
    /// Slot the next entry goes to once the ring is full.
    next: usize,
}

pub struct PacketLog {
    depth: usize,
    clock: Option<Clock>,
    seq: AtomicU64,
    ring: IsrMutex<Ring>,
}

impl PacketLog {
    #[must_use]
    pub fn new(depth: usize, clock: Option<Clock>) -> Self {
        Self {
            depth,
            clock,
            seq: AtomicU64::new(0),
            ring: IsrMutex::new(Ring {
                entries: Vec::with_capacity(depth),
                next: 0,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub fn record(&self, direction: Direction, packet: &Packet) {
        if self.depth == 0 {
            return;
        }
        let timestamp = match self.clock {
            Some(now) => now(),
            None => self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let entry = LogEntry {
            timestamp,
            direction,
            header: packet.header().words(),
        };
        self.ring.with_isr_lock(|ring| {
            if ring.entries.len() < self.depth {
                ring.entries.push(entry);
            } else {
                ring.entries[ring.next] = entry;
                ring.next = (ring.next + 1) % self.depth;
            }
        });
    }

    /// Entries oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.ring.with_isr_lock(|ring| {
            let (newer, older) = ring.entries.split_at(ring.next);
            older.iter().chain(newer).copied().collect()
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.with_isr_lock(|ring| ring.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpr_memq::UnitId;
    use gpr_packet::{Origin, PoolId};

    fn packet(token: u32) -> Packet {
        let origin = Origin::Static {
            pool: PoolId::new(0),
            unit: UnitId::new(0),
        };
        let mut p = Packet::stamped(Vec::new(), 0, origin).unwrap();
        p.set_token(token);
        p
    }

    #[test]
    fn oldest_entries_are_overwritten() {
        let log = PacketLog::new(3, None);
        for token in 0..5 {
            log.record(Direction::Tx, &packet(token));
        }
        let tokens: Vec<_> = log.snapshot().iter().map(|e| e.header[4]).collect();
        assert_eq!(tokens, [2, 3, 4]);
        let stamps: Vec<_> = log.snapshot().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, [2, 3, 4]);
    }

    #[test]
    fn zero_depth_disables() {
        let log = PacketLog::new(0, None);
        log.record(Direction::Rx, &packet(1));
        assert!(log.is_empty());
    }

    fn fixed_clock() -> u64 {
        1234
    }

    #[test]
    fn clock_is_used() {
        let log = PacketLog::new(2, Some(fixed_clock));
        log.record(Direction::Rx, &packet(9));
        assert_eq!(log.snapshot()[0].timestamp, 1234);
        assert_eq!(log.snapshot()[0].direction, Direction::Rx);
    }
}

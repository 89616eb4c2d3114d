//! Dynamic packet pools.
//!
//! A dynamic pool has no heap of its own. Each packet is allocated on demand
//! and tracked by a record in a shared list until it is freed; the record
//! carries the packet size and the owner tag that static pools keep in unit
//! metadata.

use crate::config::DynamicPoolConfig;
use crate::Error;
use crate::pool::{PoolInfo, PoolKind};
use alloc::vec::Vec;
use gpr_memq::{List, NodeId, OwnerCount, SharedList};
use gpr_packet::{HeapIndex, PoolId};
use gpr_sync::RawTicket;
use log::error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Record {
    size: usize,
    owner: u32,
    /// Address of the buffer handed out with the record.
    addr: usize,
}

pub struct DynamicPool {
    id: PoolId,
    heap: HeapIndex,
    unit_size: usize,
    max_count: usize,
    live: SharedList<Record, RawTicket>,
}

impl DynamicPool {
    /// # Errors
    /// [`Error::BadParameter`] for a zero unit size or count.
    pub fn new(id: PoolId, config: &DynamicPoolConfig) -> Result<Self, Error> {
        if config.unit_size == 0 || config.max_count == 0 {
            error!("drv: dynamic pool {} has no capacity", id.index());
            return Err(Error::BadParameter);
        }
        Ok(Self {
            id,
            heap: config.heap_index,
            unit_size: config.unit_size,
            max_count: config.max_count,
            live: SharedList::from_raw(RawTicket::new(), List::with_capacity(config.max_count)),
        })
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> PoolId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn fits(&self, heap: HeapIndex, total: usize) -> bool {
        self.heap == heap && total <= self.unit_size
    }

    /// Reserve a record for a packet of `total` bytes and hand out its buffer.
    ///
    /// `None` when `max_count` packets are live; the owners are logged after
    /// the list lock is dropped.
    #[must_use]
    pub fn take(&self, total: usize) -> Option<(NodeId, Vec<u8>)> {
        let buffer: Vec<u8> = Vec::with_capacity(total);
        let record = Record {
            size: total,
            owner: 0,
            addr: buffer.as_ptr().addr(),
        };
        let taken = self.live.with_isr(|live| {
            if live.len() >= self.max_count {
                return Err(Err(tally(live)));
            }
            live.add_tail(record).map_err(Ok)
        });
        match taken {
            Ok(node) => Some((node, buffer)),
            Err(Err(owners)) => {
                self.log_exhaustion(&owners);
                None
            }
            Err(Ok(e)) => {
                error!("drv: dynamic pool {} tracking list: {e}", self.id.index());
                None
            }
        }
    }

    /// Drop the tracking record of a freed packet whose buffer starts at
    /// `addr`.
    ///
    /// # Errors
    /// [`Error::BadParameter`] if `record` is not live in this pool or was
    /// handed out with another buffer.
    pub fn release(&self, record: NodeId, addr: usize) -> Result<(), Error> {
        let released = self.live.with_isr(|live| match live.get(record).map(|r| r.addr) {
            Some(held) if held != addr => Ok(false),
            _ => live.remove(record).map(|_| true),
        });
        match released {
            Ok(true) => Ok(()),
            Ok(false) => {
                error!(
                    "drv: dynamic pool {} free: buffer {addr:#x} was not handed out with this record",
                    self.id.index()
                );
                Err(Error::BadParameter)
            }
            Err(e) => {
                error!("drv: dynamic pool {} free: {e}", self.id.index());
                Err(Error::BadParameter)
            }
        }
    }

    /// # Errors
    /// [`Error::BadParameter`] if `record` is not live in this pool.
    pub fn set_owner(&self, record: NodeId, owner: u32) -> Result<(), Error> {
        self.live.with_isr(|live| {
            let r = live.get_mut(record).ok_or(Error::BadParameter)?;
            r.owner = owner;
            Ok(())
        })
    }

    #[must_use]
    pub fn owner(&self, record: NodeId) -> Option<u32> {
        self.live.with_isr(|live| live.get(record).map(|r| r.owner))
    }

    /// Current owner tally over all live packets.
    #[must_use]
    pub fn owner_report(&self) -> Vec<OwnerCount> {
        self.live.with_isr(|live| tally(live))
    }

    /// Bytes held by live packets.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live.with_isr(|live| live.iter().map(|(_, r)| r.size).sum())
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.live.with_isr(|live| live.len())
    }

    #[must_use]
    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            id: self.id,
            kind: PoolKind::Dynamic,
            unit_size: self.unit_size,
            max_count: self.max_count,
            free_count: self.max_count.saturating_sub(self.outstanding()),
            heap_index: self.heap,
        }
    }

    fn log_exhaustion(&self, owners: &[OwnerCount]) {
        error!(
            "drv: dynamic pool {}: all {} packets of up to {} bytes in use by {} owner(s)",
            self.id.index(),
            self.max_count,
            self.unit_size,
            owners.len()
        );
        for o in owners {
            error!("drv: owner {:#010x} holds {} packet(s)", o.owner, o.count);
        }
    }
}

fn tally(live: &List<Record>) -> Vec<OwnerCount> {
    let mut owners: Vec<OwnerCount> = Vec::new();
    for (_, r) in live.iter() {
        match owners.iter_mut().find(|o| o.owner == r.owner) {
            Some(o) => o.count += 1,
            None => owners.push(OwnerCount { owner: r.owner, count: 1 }),
        }
    }
    owners
}

//! Static packet pools.

use crate::config::StaticPoolConfig;
use crate::{Error, OWNER_METADATA_WORDS};
use alloc::vec::Vec;
use gpr_memq::memq::log_exhaustion;
use gpr_memq::{MemqBlock, MemqError, OwnerCount, UnitId};
use gpr_packet::{HeapIndex, PoolId};
use gpr_sync::IsrMutex;
use log::error;

/// Owner tag of a unit nobody holds.
const NO_OWNER: u32 = 0;

/// Bytes of owner metadata stacked on top of each unit.
const OWNER_BYTES: usize = OWNER_METADATA_WORDS * 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PoolKind {
    Static,
    Dynamic,
}

/// Capacity snapshot of one pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub id: PoolId,
    pub kind: PoolKind,
    /// Largest packet, header included, one unit carries.
    pub unit_size: usize,
    pub max_count: usize,
    pub free_count: usize,
    pub heap_index: HeapIndex,
}

/// One memq block behind the ISR lock.
pub struct StaticPool {
    id: PoolId,
    heap: HeapIndex,
    unit_size: usize,
    units: usize,
    memq: IsrMutex<MemqBlock>,
}

impl StaticPool {
    /// The heap is split into `heap_size / unit_size` units; each one gets
    /// its owner word on top, so a unit carries `unit_size` bytes of packet.
    ///
    /// # Errors
    /// [`Error::BadParameter`] if the heap cannot be partitioned.
    pub fn new(id: PoolId, config: &StaticPoolConfig) -> Result<Self, Error> {
        let units = config.heap_size.checked_div(config.unit_size).unwrap_or(0);
        let stride = config.unit_size.checked_add(OWNER_BYTES);
        let memq = stride
            .and_then(|stride| Some((units.checked_mul(stride)?, stride)))
            .ok_or(MemqError::HeapTooSmall {
                heap_size: config.heap_size,
                unit_size: config.unit_size,
            })
            .and_then(|(heap, stride)| MemqBlock::new(heap, stride, OWNER_METADATA_WORDS))
            .inspect_err(|e| error!("drv: static pool {}: {e}", id.index()))?;
        Ok(Self {
            id,
            heap: config.heap_index,
            unit_size: config.unit_size,
            units: memq.unit_count(),
            memq: IsrMutex::new(memq),
        })
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> PoolId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Whether a packet of `total` bytes on `heap` may come from this pool.
    #[inline]
    #[must_use]
    pub fn fits(&self, heap: HeapIndex, total: usize) -> bool {
        self.heap == heap && total <= self.unit_size
    }

    /// Take a unit; `None` when none is free.
    ///
    /// On exhaustion the owner tally is copied out under the lock and logged
    /// once the lock is released.
    #[must_use]
    pub fn take(&self) -> Option<(UnitId, Vec<u8>)> {
        let taken = self.memq.with_isr_lock(|q| {
            q.alloc()
                .map_err(|e| (e, q.owner_report().collect::<Vec<_>>()))
        });
        match taken {
            Ok(unit) => Some(unit),
            Err((MemqError::Exhausted, owners)) => {
                log_exhaustion(self.units, self.unit_size, &owners);
                None
            }
            Err((e, _)) => {
                error!("drv: static pool {} alloc: {e}", self.id.index());
                None
            }
        }
    }

    /// Return the unit and clear its owner tag. A rejected free leaves the
    /// tag of the real holder alone.
    ///
    /// # Errors
    /// [`Error::BadParameter`] for a foreign unit, a double free or a buffer
    /// that is not this unit's region.
    pub fn give_back(&self, unit: UnitId, buffer: Vec<u8>) -> Result<(), Error> {
        self.memq
            .with_isr_lock(|q| {
                q.free(unit, buffer)?;
                q.set_metadata(unit, 0, NO_OWNER)
            })
            .inspect_err(|e| error!("drv: static pool {} free of unit {}: {e}", self.id.index(), unit.index()))
            .map_err(Error::from)
    }

    /// # Errors
    /// [`Error::BadParameter`] if `unit` is not part of this pool.
    pub fn set_owner(&self, unit: UnitId, owner: u32) -> Result<(), Error> {
        Ok(self.memq.with_isr_lock(|q| q.set_metadata(unit, 0, owner))?)
    }

    /// # Errors
    /// [`Error::BadParameter`] if `unit` is not part of this pool.
    pub fn owner(&self, unit: UnitId) -> Result<u32, Error> {
        Ok(self.memq.with_isr_lock(|q| q.get_metadata(unit, 0))?)
    }

    /// Owners tallied by the most recent exhaustion.
    #[must_use]
    pub fn owner_report(&self) -> Vec<OwnerCount> {
        self.memq.with_isr_lock(|q| q.owner_report().collect())
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.units - self.memq.with_isr_lock(|q| q.free_count())
    }

    #[must_use]
    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            id: self.id,
            kind: PoolKind::Static,
            unit_size: self.unit_size,
            max_count: self.units,
            free_count: self.units - self.outstanding(),
            heap_index: self.heap,
        }
    }
}

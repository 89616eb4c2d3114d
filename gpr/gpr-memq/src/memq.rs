//! Fixed-unit memory queue.
//!
//! A block partitions `heap_size` bytes into `heap_size / unit_size` units.
//! Each unit is laid out as
//!
//! ```text
//! +------------------------------+-----------------------------------+
//! | metadata (metadata_words × 4)|   usable region (unit − metadata) |
//! +------------------------------+-----------------------------------+
//! ```
//!
//! The metadata words stay with the block (they are allocator-owned); the
//! usable region is a buffer handed to the caller on [`MemqBlock::alloc`] and
//! handed back on [`MemqBlock::free`]. Buffers are created once at
//! construction, so the steady state performs no heap allocation.
//!
//! Metadata word 0 is the owner tag. When the free list runs dry, every unit's
//! owner tag is tallied into [`MemqBlock::owner_report`]. The block itself
//! never logs from `alloc` or `free`, since callers run those under a lock;
//! the lock holder passes the report to [`log_exhaustion`] once it has let go.
//!
//! A unit is only taken back together with the buffer it was handed out with:
//! the block remembers each region's address, the way a heap span decides
//! membership by address range.

use crate::list::{List, ListError, NodeId};
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, error};

/// Bytes per metadata word.
const WORD: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u32);

impl UnitId {
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// One line of the exhaustion report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OwnerCount {
    pub owner: u32,
    pub count: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemqError {
    #[error("unit size {unit_size} cannot hold {metadata_words} metadata words")]
    UnitTooSmall {
        unit_size: usize,
        metadata_words: usize,
    },
    #[error("heap of {heap_size} bytes holds no unit of {unit_size} bytes")]
    HeapTooSmall { heap_size: usize, unit_size: usize },
    #[error("unit {0} does not belong to this block")]
    BadUnit(u32),
    #[error("metadata index {index} out of range (block has {words} words)")]
    BadMetadataIndex { index: usize, words: usize },
    #[error("buffer handed back for unit {0} is not that unit's region")]
    ForeignBuffer(u32),
    #[error("unit {0} is already free")]
    AlreadyFree(u32),
    #[error("all units are in use")]
    Exhausted,
    #[error("unit {0} was on the free list without its buffer")]
    MissingBuffer(u32),
    #[error(transparent)]
    List(#[from] ListError),
}

pub struct MemqBlock {
    unit_size: usize,
    metadata_words: usize,
    /// `unit_count × metadata_words` words, unit-major.
    metadata: Vec<u32>,
    /// Usable regions of the units that are currently free.
    parked: Vec<Option<Vec<u8>>>,
    /// Address of each unit's region.
    regions: Vec<usize>,
    /// Free-list node of each unit; the node value is the unit index.
    nodes: Vec<NodeId>,
    free: List<u32>,
    /// Distinct owner tags seen by the last exhaustion scan.
    owner_ids: Vec<u32>,
    /// Units held per entry of `owner_ids`.
    owner_counts: Vec<u32>,
}

impl MemqBlock {
    /// Partition a heap of `heap_size` bytes into units of `unit_size` bytes.
    ///
    /// # Errors
    /// - [`MemqError::UnitTooSmall`] if a unit cannot hold the metadata words.
    /// - [`MemqError::HeapTooSmall`] if not even one unit fits.
    pub fn new(heap_size: usize, unit_size: usize, metadata_words: usize) -> Result<Self, MemqError> {
        let metadata_bytes = metadata_words.saturating_mul(WORD);
        if unit_size == 0 || unit_size < metadata_bytes {
            return Err(MemqError::UnitTooSmall {
                unit_size,
                metadata_words,
            });
        }
        let unit_count = heap_size / unit_size;
        if unit_count == 0 || u32::try_from(unit_count).is_err() {
            return Err(MemqError::HeapTooSmall {
                heap_size,
                unit_size,
            });
        }

        let payload = unit_size - metadata_bytes;
        let mut free = List::with_capacity(unit_count);
        let mut nodes = Vec::with_capacity(unit_count);
        let mut parked = Vec::with_capacity(unit_count);
        let mut regions = Vec::with_capacity(unit_count);
        for unit in 0..unit_count {
            #[allow(clippy::cast_possible_truncation)]
            let node = free.add_tail(unit as u32)?;
            nodes.push(node);
            let region: Vec<u8> = Vec::with_capacity(payload);
            regions.push(region.as_ptr().addr());
            parked.push(Some(region));
        }

        debug!(
            "memq: {unit_count} units of {unit_size} bytes ({} unused of {heap_size})",
            heap_size % unit_size
        );

        Ok(Self {
            unit_size,
            metadata_words,
            metadata: vec![0; unit_count * metadata_words],
            parked,
            regions,
            nodes,
            free,
            owner_ids: Vec::with_capacity(unit_count),
            owner_counts: Vec::with_capacity(unit_count),
        })
    }

    #[inline]
    #[must_use]
    pub const fn unit_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    #[must_use]
    pub const fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Bytes handed to the caller per unit.
    #[inline]
    #[must_use]
    pub const fn payload_capacity(&self) -> usize {
        self.unit_size - self.metadata_words * WORD
    }

    #[inline]
    #[must_use]
    pub const fn metadata_words(&self) -> usize {
        self.metadata_words
    }

    /// Whether `unit` names a unit of this block.
    #[inline]
    #[must_use]
    pub const fn contains(&self, unit: UnitId) -> bool {
        (unit.0 as usize) < self.nodes.len()
    }

    /// Pop a unit off the free list.
    ///
    /// # Errors
    /// - [`MemqError::Exhausted`] when no unit is free. The owner tally is
    ///   available through [`owner_report`](Self::owner_report) until the next
    ///   exhaustion. Callers must not retry in a tight loop.
    /// - [`MemqError::List`] or [`MemqError::MissingBuffer`] if the free list
    ///   is corrupted.
    pub fn alloc(&mut self) -> Result<(UnitId, Vec<u8>), MemqError> {
        let node = match self.free.pop_front() {
            Ok(node) => node,
            Err(ListError::Empty) => {
                self.tally_owners();
                return Err(MemqError::Exhausted);
            }
            Err(e) => return Err(e.into()),
        };
        let unit = self.free.get(node).copied().ok_or(ListError::BadParam)?;
        let buffer = self.parked[unit as usize]
            .take()
            .ok_or(MemqError::MissingBuffer(unit))?;
        Ok((UnitId(unit), buffer))
    }

    /// Return a unit and its buffer to the free list.
    ///
    /// # Errors
    /// - [`MemqError::BadUnit`] if `unit` is not part of this block.
    /// - [`MemqError::AlreadyFree`] on a double free.
    /// - [`MemqError::ForeignBuffer`] if `buffer` is not the region this unit
    ///   was handed out with.
    pub fn free(&mut self, unit: UnitId, mut buffer: Vec<u8>) -> Result<(), MemqError> {
        let at = self.unit_index(unit)?;
        if self.parked[at].is_some() {
            return Err(MemqError::AlreadyFree(unit.0));
        }
        // Zero-sized regions all share one dangling address.
        if self.payload_capacity() > 0 && buffer.as_ptr().addr() != self.regions[at] {
            return Err(MemqError::ForeignBuffer(unit.0));
        }
        self.free.push_back(self.nodes[at])?;
        buffer.clear();
        self.parked[at] = Some(buffer);
        Ok(())
    }

    /// Write metadata word `index` of `unit`.
    ///
    /// # Errors
    /// [`MemqError::BadUnit`] or [`MemqError::BadMetadataIndex`].
    pub fn set_metadata(&mut self, unit: UnitId, index: usize, value: u32) -> Result<(), MemqError> {
        let word = self.metadata_slot(unit, index)?;
        self.metadata[word] = value;
        Ok(())
    }

    /// Read metadata word `index` of `unit`.
    ///
    /// # Errors
    /// [`MemqError::BadUnit`] or [`MemqError::BadMetadataIndex`].
    pub fn get_metadata(&self, unit: UnitId, index: usize) -> Result<u32, MemqError> {
        let word = self.metadata_slot(unit, index)?;
        Ok(self.metadata[word])
    }

    /// Owner tally from the most recent exhaustion scan.
    #[must_use]
    pub fn owner_report(&self) -> impl Iterator<Item = OwnerCount> + '_ {
        self.owner_ids
            .iter()
            .zip(&self.owner_counts)
            .map(|(&owner, &count)| OwnerCount { owner, count })
    }

    /// Tally metadata word 0 over all units.
    ///
    /// Runs on the failure path only; the tally arrays are sized at
    /// construction and never grow here.
    fn tally_owners(&mut self) {
        self.owner_ids.clear();
        self.owner_counts.clear();
        if self.metadata_words == 0 {
            return;
        }
        for unit in 0..self.unit_count() {
            let owner = self.metadata[unit * self.metadata_words];
            match self.owner_ids.iter().position(|&o| o == owner) {
                Some(i) => self.owner_counts[i] += 1,
                None => {
                    self.owner_ids.push(owner);
                    self.owner_counts.push(1);
                }
            }
        }
    }

    fn unit_index(&self, unit: UnitId) -> Result<usize, MemqError> {
        if self.contains(unit) {
            Ok(unit.0 as usize)
        } else {
            Err(MemqError::BadUnit(unit.0))
        }
    }

    fn metadata_slot(&self, unit: UnitId, index: usize) -> Result<usize, MemqError> {
        let at = self.unit_index(unit)?;
        if index >= self.metadata_words {
            return Err(MemqError::BadMetadataIndex {
                index,
                words: self.metadata_words,
            });
        }
        Ok(at * self.metadata_words + index)
    }
}

/// Log an exhaustion report: one summary line, then one line per owner.
///
/// Call this with no lock held; the log sink is free to call back into
/// whatever owns the block.
pub fn log_exhaustion(unit_count: usize, unit_size: usize, owners: &[OwnerCount]) {
    error!(
        "memq: all {unit_count} units of {unit_size} bytes in use by {} owner(s)",
        owners.len()
    );
    for OwnerCount { owner, count } in owners {
        error!("memq: owner {owner:#010x} holds {count} unit(s)");
    }
}

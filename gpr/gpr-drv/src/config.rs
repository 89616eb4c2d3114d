//! Driver configuration.
//!
//! [`DriverConfig::default`] describes a typical application-processor setup;
//! tests and embedders adjust it through the `with_*` builders.

use alloc::vec;
use alloc::vec::Vec;
use gpr_packet::{DomainId, HeapIndex};
use gpr_session::Strategy;

/// Timestamp source for the packet log.
pub type Clock = fn() -> u64;

/// A pool carved out of one pre-allocated heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StaticPoolConfig {
    /// Largest packet, header included; the owner tag is kept on top.
    pub unit_size: usize,
    /// Heap size in bytes; `heap_size / unit_size` units are created.
    pub heap_size: usize,
    pub heap_index: HeapIndex,
}

impl StaticPoolConfig {
    /// `count` units of `unit_size` bytes.
    #[must_use]
    pub const fn units(unit_size: usize, count: usize, heap_index: HeapIndex) -> Self {
        Self {
            unit_size,
            heap_size: unit_size * count,
            heap_index,
        }
    }
}

/// A pool whose packets are allocated one by one, up to `max_count`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DynamicPoolConfig {
    /// Largest packet, header included.
    pub unit_size: usize,
    pub max_count: usize,
    pub heap_index: HeapIndex,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The domain this driver instance runs in.
    pub host_domain: DomainId,
    pub static_pools: Vec<StaticPoolConfig>,
    pub dynamic_pools: Vec<DynamicPoolConfig>,
    pub session_strategy: Strategy,
    /// Slots per session registry.
    pub session_slots: usize,
    /// Packet log entries; 0 disables the log.
    pub packet_log_depth: usize,
    /// `None` stamps log entries with a sequence number.
    pub clock: Option<Clock>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host_domain: DomainId::APPS,
            static_pools: vec![
                StaticPoolConfig::units(512, 16, HeapIndex::Default),
                StaticPoolConfig::units(4096, 4, HeapIndex::Default),
                StaticPoolConfig::units(512, 8, HeapIndex::Alternate),
            ],
            dynamic_pools: vec![DynamicPoolConfig {
                unit_size: 64 * 1024,
                max_count: 4,
                heap_index: HeapIndex::Default,
            }],
            session_strategy: Strategy::Linear,
            session_slots: 64,
            packet_log_depth: 32,
            clock: None,
        }
    }
}

impl DriverConfig {
    #[must_use]
    pub const fn with_host_domain(mut self, domain: DomainId) -> Self {
        self.host_domain = domain;
        self
    }

    #[must_use]
    pub fn with_static_pools(mut self, pools: impl IntoIterator<Item = StaticPoolConfig>) -> Self {
        self.static_pools = pools.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_dynamic_pools(mut self, pools: impl IntoIterator<Item = DynamicPoolConfig>) -> Self {
        self.dynamic_pools = pools.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn with_sessions(mut self, strategy: Strategy, slots: usize) -> Self {
        self.session_strategy = strategy;
        self.session_slots = slots;
        self
    }

    #[must_use]
    pub const fn with_packet_log(mut self, depth: usize) -> Self {
        self.packet_log_depth = depth;
        self
    }

    #[must_use]
    pub const fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }
}

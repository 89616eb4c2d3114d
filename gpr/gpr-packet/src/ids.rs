//! Addressing and arena selectors.

use core::fmt;

/// Highest domain id the routing table has a slot for.
pub const MAX_DOMAIN_ID: u8 = 9;

/// A processor, process or address space that exchanges packets.
///
/// Domain ids are small dense integers assigned by the platform; 0 is
/// reserved and never routable.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DomainId(u8);

impl DomainId {
    pub const INVALID: Self = Self(0);
    pub const MODEM: Self = Self(1);
    pub const ADSP: Self = Self(2);
    pub const APPS: Self = Self(3);
    pub const SDSP: Self = Self(4);
    pub const CDSP: Self = Self(5);
    pub const CC_DSP: Self = Self(6);
    pub const GPDSP0: Self = Self(7);
    pub const GPDSP1: Self = Self(8);
    pub const APPS2: Self = Self(9);

    #[inline]
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Whether the id names a routing table slot.
    #[inline]
    #[must_use]
    pub const fn is_routable(self) -> bool {
        self.0 != 0 && self.0 <= MAX_DOMAIN_ID
    }
}

impl fmt::Debug for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::INVALID => "invalid",
            Self::MODEM => "modem",
            Self::ADSP => "adsp",
            Self::APPS => "apps",
            Self::SDSP => "sdsp",
            Self::CDSP => "cdsp",
            Self::CC_DSP => "cc_dsp",
            Self::GPDSP0 => "gpdsp0",
            Self::GPDSP1 => "gpdsp1",
            Self::APPS2 => "apps2",
            _ => return write!(f, "DomainId({})", self.0),
        };
        write!(f, "DomainId({}:{name})", self.0)
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory arena a pool or registry allocates from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum HeapIndex {
    /// General-purpose heap.
    #[default]
    Default = 0,
    /// Alternate arena, e.g. low-power (island) memory.
    Alternate = 1,
}

impl HeapIndex {
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Default),
            1 => Some(Self::Alternate),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Index of a packet pool inside one driver instance.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(u8);

impl PoolId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

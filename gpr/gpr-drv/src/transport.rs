//! The datalink plug-in contract.

use crate::{Driver, Error};
use alloc::sync::Arc;
use gpr_packet::{DomainId, Packet};

/// Moves packets between the host domain and one remote domain.
///
/// Implementations are installed per domain at [`Driver::init`]. The driver
/// never holds a lock while calling into a transport, so a transport may call
/// back into the driver (to free, to allocate a reply, or to deliver).
pub trait Transport: Send + Sync {
    /// Take ownership of `packet` for delivery to `domain`.
    ///
    /// # Errors
    /// A [`SendError`] handing the packet back. The driver does not free it.
    fn send(&self, driver: &Driver, domain: DomainId, packet: Packet) -> Result<(), SendError>;

    /// Return a packet that arrived through this transport once the host is
    /// done with it.
    ///
    /// # Errors
    /// Transport specific.
    fn receive_done(&self, domain: DomainId, packet: Packet) -> Result<(), Error>;
}

/// A failed send, with the packet returned to the caller.
#[derive(Debug, thiserror::Error)]
#[error("send failed: {error}")]
pub struct SendError {
    #[source]
    pub error: Error,
    pub packet: Packet,
}

impl SendError {
    #[inline]
    #[must_use]
    pub const fn new(error: Error, packet: Packet) -> Self {
        Self { error, packet }
    }

    #[inline]
    #[must_use]
    pub fn into_packet(self) -> Packet {
        self.packet
    }
}

/// One routing table entry as supplied at init.
#[derive(Clone)]
pub struct DatalinkConfig {
    pub domain: DomainId,
    pub transport: Arc<dyn Transport>,
    /// Whether the domain can take packets by reference to shared memory.
    pub supports_shared_mem: bool,
}

impl DatalinkConfig {
    #[must_use]
    pub fn new(domain: DomainId, transport: Arc<dyn Transport>, supports_shared_mem: bool) -> Self {
        Self {
            domain,
            transport,
            supports_shared_mem,
        }
    }
}

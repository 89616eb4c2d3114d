//! In-process delivery for packets addressed to the host domain.

use crate::{Driver, Error, SendError, Transport};
use gpr_packet::{DomainId, Packet};
use log::{error, trace, warn};

/// The host domain's default route.
///
/// Sending is a session lookup followed by a synchronous call of the session
/// callback on the sender's thread. There is no queue; ordering and
/// re-entrancy belong to the callback.
#[derive(Debug, Default, Copy, Clone)]
pub struct LocalLink;

impl Transport for LocalLink {
    fn send(&self, driver: &Driver, domain: DomainId, packet: Packet) -> Result<(), SendError> {
        let port = packet.dst_port();
        let Ok(callback) = driver.session(port) else {
            warn!("local: no session for port {port:#010x} in domain {domain}");
            return Err(SendError::new(Error::NotFound, packet));
        };
        trace!("local: {packet:?} -> port {port:#010x}");
        // The callback owns the packet from here on; its failure is its own.
        if let Err(e) = callback(driver, packet) {
            error!("local: session {port:#010x} failed to handle packet: {e}");
        }
        Ok(())
    }

    fn receive_done(&self, domain: DomainId, packet: Packet) -> Result<(), Error> {
        trace!("local: domain {domain} returned {packet:?}");
        Ok(())
    }
}

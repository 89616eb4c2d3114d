use crate::config::{DriverConfig, DynamicPoolConfig, StaticPoolConfig};
use crate::dynamic::DynamicPool;
use crate::local::LocalLink;
use crate::packet_log::{Direction, LogEntry, PacketLog};
use crate::pool::{PoolInfo, PoolKind, StaticPool};
use crate::{DatalinkConfig, Error, MAX_PACKET_POOLS, SendError, Transport};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::array;
use gpr_memq::OwnerCount;
use gpr_packet::opcodes::{BasicAccepted, BasicResult, IBASIC_EVT_ACCEPTED, IBASIC_RSP_RESULT};
use gpr_packet::{DomainId, HEADER_BYTES, HeapIndex, MAX_DOMAIN_ID, MAX_PACKET_SIZE, Origin, Packet, PoolId, Status};
use gpr_session::Registry;
use log::{debug, error, info, trace, warn};

/// A port's handler. It receives ownership of every packet delivered to the
/// port and is expected to free it (or send it on).
pub type Callback = Arc<dyn Fn(&Driver, Packet) -> Result<(), Error> + Send + Sync>;

const ROUTES: usize = MAX_DOMAIN_ID as usize + 1;

struct Route {
    transport: Arc<dyn Transport>,
    supports_shared_mem: bool,
}

/// Header fields for [`Driver::alloc_ext`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AllocArgs {
    pub src_domain: DomainId,
    pub src_port: u32,
    pub dst_domain: DomainId,
    pub dst_port: u32,
    pub token: u32,
    pub opcode: u32,
    pub client_data: u8,
    pub heap_index: HeapIndex,
    pub payload_size: usize,
}

/// The packet router of one domain.
///
/// Owns the packet pools, the two session registries (default heap and
/// alternate heap) and the routing table. All methods take `&self`; the
/// driver is shared between threads behind an `Arc` or a reference.
pub struct Driver {
    host: DomainId,
    /// Ascending unit size.
    statics: Vec<StaticPool>,
    /// Ascending unit size.
    dynamics: Vec<DynamicPool>,
    /// Indexed by [`HeapIndex::raw`].
    sessions: [Registry<Callback>; 2],
    /// Indexed by domain id; fixed after init.
    routes: [Option<Route>; ROUTES],
    log: PacketLog,
}

impl Driver {
    /// Build a driver whose datalinks declare their shared-memory support.
    ///
    /// The host domain is routed through [`LocalLink`] unless `links` carries
    /// an entry for it. Everything built so far is dropped if any step fails.
    ///
    /// # Errors
    /// - [`Error::BadParameter`] for an unroutable domain, too many pools or a
    ///   pool or registry geometry that cannot be built.
    /// - [`Error::AlreadyExists`] if two links name the same domain.
    pub fn init(config: DriverConfig, links: impl IntoIterator<Item = DatalinkConfig>) -> Result<Self, Error> {
        Self::build(config, links)
    }

    /// Build a driver for datalinks that predate the shared-memory flag.
    ///
    /// Every domain, the host included, is treated as supporting shared
    /// memory.
    ///
    /// # Errors
    /// As [`init`](Self::init).
    pub fn init_legacy(
        config: DriverConfig,
        links: impl IntoIterator<Item = (DomainId, Arc<dyn Transport>)>,
    ) -> Result<Self, Error> {
        Self::build(
            config,
            links
                .into_iter()
                .map(|(domain, transport)| DatalinkConfig::new(domain, transport, true)),
        )
    }

    fn build(config: DriverConfig, links: impl IntoIterator<Item = DatalinkConfig>) -> Result<Self, Error> {
        let host = config.host_domain;
        if !host.is_routable() {
            error!("drv: host domain {host:?} is not routable");
            return Err(Error::BadParameter);
        }
        let pools = config.static_pools.len() + config.dynamic_pools.len();
        if pools > MAX_PACKET_POOLS {
            error!("drv: {pools} packet pools configured, at most {MAX_PACKET_POOLS} supported");
            return Err(Error::BadParameter);
        }

        let statics = build_static(config.static_pools)?;
        let dynamics = build_dynamic(config.dynamic_pools)?;
        let sessions = [
            Registry::new(HeapIndex::Default, config.session_strategy, config.session_slots)?,
            Registry::new(HeapIndex::Alternate, config.session_strategy, config.session_slots)?,
        ];

        let mut routes: [Option<Route>; ROUTES] = array::from_fn(|_| None);
        for link in links {
            if !link.domain.is_routable() {
                error!("drv: datalink for unroutable domain {:?}", link.domain);
                return Err(Error::BadParameter);
            }
            let slot = &mut routes[usize::from(link.domain.raw())];
            if slot.is_some() {
                error!("drv: second datalink for domain {:?}", link.domain);
                return Err(Error::AlreadyExists);
            }
            *slot = Some(Route {
                transport: link.transport,
                supports_shared_mem: link.supports_shared_mem,
            });
        }
        let local = &mut routes[usize::from(host.raw())];
        if local.is_none() {
            *local = Some(Route {
                transport: Arc::new(LocalLink),
                supports_shared_mem: true,
            });
        }

        info!(
            "drv: up in domain {host:?}: {} static and {} dynamic pool(s), {} route(s)",
            statics.len(),
            dynamics.len(),
            routes.iter().flatten().count()
        );

        Ok(Self {
            host,
            statics,
            dynamics,
            sessions,
            routes,
            log: PacketLog::new(config.packet_log_depth, config.clock),
        })
    }

    #[inline]
    #[must_use]
    pub const fn host_domain(&self) -> DomainId {
        self.host
    }

    /// Allocate a packet with `payload_size` zeroed payload bytes.
    ///
    /// Static pools are tried before dynamic ones, each in ascending unit
    /// size; an exhausted pool logs its owners and the search moves on.
    ///
    /// # Errors
    /// - [`Error::BadParameter`] if the packet would not fit the size field.
    /// - [`Error::ResourceExhausted`] if no pool on `heap_index` can serve it.
    pub fn alloc(&self, payload_size: usize, heap_index: HeapIndex) -> Result<Packet, Error> {
        let total = HEADER_BYTES
            .checked_add(payload_size)
            .filter(|&t| t <= MAX_PACKET_SIZE)
            .ok_or_else(|| {
                warn!("drv: payload of {payload_size} bytes does not fit a packet");
                Error::BadParameter
            })?;

        for pool in self.statics.iter().filter(|p| p.fits(heap_index, total)) {
            if let Some((unit, buf)) = pool.take() {
                let origin = Origin::Static { pool: pool.id(), unit };
                return Ok(Packet::stamped(buf, payload_size, origin)?);
            }
        }
        for pool in self.dynamics.iter().filter(|p| p.fits(heap_index, total)) {
            if let Some((record, buf)) = pool.take(total) {
                let origin = Origin::Dynamic { pool: pool.id(), record };
                return Ok(Packet::stamped(buf, payload_size, origin)?);
            }
        }

        warn!("drv: no pool can serve {total} bytes on the {heap_index:?} heap");
        Err(Error::ResourceExhausted)
    }

    /// Allocate a packet and fill its header. The pool's owner tag is set to
    /// `src_port`.
    ///
    /// # Errors
    /// As [`alloc`](Self::alloc).
    pub fn alloc_ext(&self, args: &AllocArgs) -> Result<Packet, Error> {
        let mut packet = self.alloc(args.payload_size, args.heap_index)?;
        packet.set_src_domain(args.src_domain);
        packet.set_src_port(args.src_port);
        packet.set_dst_domain(args.dst_domain);
        packet.set_dst_port(args.dst_port);
        packet.set_token(args.token);
        packet.set_opcode(args.opcode);
        packet.set_client_data(args.client_data);
        if let Err(e) = self.set_owner(packet.origin(), args.src_port) {
            self.release(packet);
            return Err(e);
        }
        Ok(packet)
    }

    /// Hand `packet` to the route of its destination domain.
    ///
    /// A static-pool packet is attributed to its destination port while in
    /// flight; a failed send attributes it back to its source port. The packet
    /// is never freed here: on failure it comes back in the [`SendError`].
    ///
    /// # Errors
    /// - [`Error::BadParameter`] for an unroutable destination domain.
    /// - [`Error::NotFound`] if the domain has no route, or (local delivery)
    ///   the destination port has no session.
    /// - whatever the transport reports.
    pub fn async_send(&self, packet: Packet) -> Result<(), SendError> {
        let domain = packet.dst_domain();
        if !domain.is_routable() {
            warn!("drv: cannot route {packet:?}");
            return Err(SendError::new(Error::BadParameter, packet));
        }
        let Some(route) = self.route(domain) else {
            warn!("drv: no route to domain {domain:?}");
            return Err(SendError::new(Error::NotFound, packet));
        };

        if matches!(packet.origin(), Origin::Static { .. }) {
            self.stamp(&packet, packet.dst_port());
        }
        if domain != self.host {
            self.log.record(Direction::Tx, &packet);
        }

        trace!("drv: send {packet:?}");
        route.transport.send(self, domain, packet).inspect_err(|e| {
            if matches!(e.packet.origin(), Origin::Static { .. }) {
                self.stamp(&e.packet, e.packet.src_port());
            }
            error!("drv: send to domain {domain:?} failed: {}", e.error);
        })
    }

    /// Return `packet` to where it came from: its static pool, its dynamic
    /// pool, or the datalink that delivered it.
    ///
    /// # Errors
    /// - [`Error::BadParameter`] if the origin names no pool of this driver,
    ///   or the pool does not hold the packet.
    /// - [`Error::NotFound`] if the delivering domain has no route.
    pub fn free(&self, packet: Packet) -> Result<(), Error> {
        trace!("drv: free {packet:?}");
        match packet.origin() {
            Origin::Static { pool, unit } => {
                let pool = self.statics.get(pool.index()).ok_or_else(|| {
                    error!("drv: free of {packet:?} names an unknown pool");
                    Error::BadParameter
                })?;
                let (buf, _) = packet.into_parts();
                pool.give_back(unit, buf)
            }
            Origin::Dynamic { pool, record } => {
                let pool = self.dynamics.get(pool.index()).ok_or_else(|| {
                    error!("drv: free of {packet:?} names an unknown pool");
                    Error::BadParameter
                })?;
                let (buf, _) = packet.into_parts();
                pool.release(record, buf.as_ptr().addr())
            }
            Origin::Datalink { domain } => {
                let route = self.route(domain).ok_or_else(|| {
                    error!("drv: free of {packet:?}: domain {domain:?} has no route");
                    Error::NotFound
                })?;
                route.transport.receive_done(domain, packet).inspect_err(|e| {
                    error!("drv: receive_done of domain {domain:?} failed: {e}");
                })
            }
        }
    }

    /// Register `callback` for `port` in the registry of `heap_index`.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`] if that registry already has `port`.
    /// - [`Error::ResourceExhausted`] if a linear registry is full.
    pub fn register<F>(&self, port: u32, callback: F, heap_index: HeapIndex) -> Result<(), Error>
    where
        F: Fn(&Self, Packet) -> Result<(), Error> + Send + Sync + 'static,
    {
        Ok(self.registry(heap_index).register(port, Arc::new(callback))?)
    }

    /// # Errors
    /// [`Error::NotFound`] if `port` is not registered in that registry.
    pub fn deregister(&self, port: u32, heap_index: HeapIndex) -> Result<(), Error> {
        self.registry(heap_index).deregister(port)?;
        Ok(())
    }

    /// Whether `port` is registered in either registry.
    #[must_use]
    pub fn is_registered(&self, port: u32) -> bool {
        self.sessions.iter().any(|r| r.contains(port))
    }

    /// Resolve `port`. The alternate-heap registry is searched first, so a
    /// registration there shadows the same port on the default heap.
    ///
    /// # Errors
    /// [`Error::NotFound`] if neither registry has `port`.
    pub fn session(&self, port: u32) -> Result<Callback, Error> {
        self.registry(HeapIndex::Alternate)
            .get(port)
            .or_else(|_| self.registry(HeapIndex::Default).get(port))
            .map_err(Error::from)
    }

    /// Entry point for a datalink that received `bytes` from `domain`.
    ///
    /// The packet is delivered locally when addressed to the host domain and
    /// forwarded otherwise. An undeliverable packet is freed, which returns
    /// it through `domain`'s `receive_done`. A buffer that does not hold a
    /// valid packet is dropped.
    ///
    /// # Errors
    /// - [`Error::BadParameter`] for an unroutable `domain` or a malformed
    ///   buffer.
    /// - the delivery error otherwise, [`Error::NotFound`] for an unknown port
    ///   or domain.
    pub fn receive(&self, domain: DomainId, bytes: Vec<u8>) -> Result<(), Error> {
        if !domain.is_routable() {
            warn!("drv: receive from unroutable domain {domain:?}");
            return Err(Error::BadParameter);
        }
        let packet = Packet::from_datalink(bytes, domain).inspect_err(|e| {
            warn!("drv: malformed packet from domain {domain:?}: {e}");
        })?;
        self.log.record(Direction::Rx, &packet);
        debug!("drv: received {packet:?}");

        self.async_send(packet).map_err(|SendError { error, packet }| {
            warn!("drv: dropping undeliverable {packet:?}: {error}");
            self.release(packet);
            error
        })
    }

    /// Release a packet a datalink has finished transmitting.
    ///
    /// # Errors
    /// As [`free`](Self::free).
    pub fn send_done(&self, packet: Packet) -> Result<(), Error> {
        self.free(packet)
    }

    /// Complete `command` with `status`: send an [`IBASIC_RSP_RESULT`] reply
    /// and free the command, whether or not the reply goes out.
    ///
    /// # Errors
    /// The failure to allocate or send the reply.
    pub fn end_command(&self, command: Packet, status: Status) -> Result<(), Error> {
        let result = BasicResult {
            opcode: command.opcode(),
            status,
        };
        self.reply(command, IBASIC_RSP_RESULT, BasicResult::SIZE, |payload| {
            result.write(payload);
        })
    }

    /// Acknowledge `command` with an [`IBASIC_EVT_ACCEPTED`] event and free
    /// it, whether or not the event goes out.
    ///
    /// # Errors
    /// The failure to allocate or send the event.
    pub fn accept_command(&self, command: Packet) -> Result<(), Error> {
        let accepted = BasicAccepted {
            opcode: command.opcode(),
        };
        self.reply(command, IBASIC_EVT_ACCEPTED, BasicAccepted::SIZE, |payload| {
            accepted.write(payload);
        })
    }

    /// Unit size, capacity, heap and usage of every pool, static pools first.
    #[must_use]
    pub fn pool_info(&self) -> Vec<PoolInfo> {
        self.statics
            .iter()
            .map(StaticPool::info)
            .chain(self.dynamics.iter().map(DynamicPool::info))
            .collect()
    }

    /// The owner tag the pools keep for `packet`; `None` for datalink packets.
    #[must_use]
    pub fn packet_owner(&self, packet: &Packet) -> Option<u32> {
        match packet.origin() {
            Origin::Static { pool, unit } => self.statics.get(pool.index())?.owner(unit).ok(),
            Origin::Dynamic { pool, record } => self.dynamics.get(pool.index())?.owner(record),
            Origin::Datalink { .. } => None,
        }
    }

    /// Owners tallied for `pool` by its last exhaustion (static pools) or
    /// over its live packets (dynamic pools).
    #[must_use]
    pub fn owner_report(&self, info: &PoolInfo) -> Vec<OwnerCount> {
        match info.kind {
            PoolKind::Static => self
                .statics
                .get(info.id.index())
                .map(StaticPool::owner_report)
                .unwrap_or_default(),
            PoolKind::Dynamic => self
                .dynamics
                .get(info.id.index())
                .map(DynamicPool::owner_report)
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_shared_mem_supported(&self, domain: DomainId) -> bool {
        self.route(domain).is_some_and(|r| r.supports_shared_mem)
    }

    /// Recent cross-domain traffic, oldest first.
    #[must_use]
    pub fn packet_log(&self) -> Vec<LogEntry> {
        self.log.snapshot()
    }

    /// Tear the driver down, reporting packets that were never freed.
    pub fn deinit(self) {
        for pool in &self.statics {
            let n = pool.outstanding();
            if n > 0 {
                warn!(
                    "drv: static pool {} ({} B) dropped with {n} packet(s) outstanding",
                    pool.id().index(),
                    pool.unit_size()
                );
            }
        }
        for pool in &self.dynamics {
            let n = pool.outstanding();
            if n > 0 {
                warn!(
                    "drv: dynamic pool {} ({} bytes live) dropped with {n} packet(s) outstanding",
                    pool.id().index(),
                    pool.live_bytes()
                );
            }
        }
        let sessions: usize = self.sessions.iter().map(Registry::len).sum();
        info!("drv: down in domain {:?}, {sessions} session(s) still registered", self.host);
    }

    fn route(&self, domain: DomainId) -> Option<&Route> {
        self.routes.get(usize::from(domain.raw()))?.as_ref()
    }

    const fn registry(&self, heap_index: HeapIndex) -> &Registry<Callback> {
        match heap_index {
            HeapIndex::Default => &self.sessions[0],
            HeapIndex::Alternate => &self.sessions[1],
        }
    }

    fn set_owner(&self, origin: Origin, owner: u32) -> Result<(), Error> {
        match origin {
            Origin::Static { pool, unit } => self
                .statics
                .get(pool.index())
                .ok_or(Error::BadParameter)?
                .set_owner(unit, owner),
            Origin::Dynamic { pool, record } => self
                .dynamics
                .get(pool.index())
                .ok_or(Error::BadParameter)?
                .set_owner(record, owner),
            Origin::Datalink { .. } => Ok(()),
        }
    }

    /// Best-effort owner stamp on the send path.
    fn stamp(&self, packet: &Packet, owner: u32) {
        if let Err(e) = self.set_owner(packet.origin(), owner) {
            error!("drv: cannot attribute {packet:?} to {owner:#010x}: {e}");
        }
    }

    /// Free a packet whose failure has already been reported elsewhere.
    fn release(&self, packet: Packet) {
        if let Err(e) = self.free(packet) {
            error!("drv: packet leaked: {e}");
        }
    }

    fn reply(&self, command: Packet, opcode: u32, payload_size: usize, fill: impl FnOnce(&mut [u8])) -> Result<(), Error> {
        let args = AllocArgs {
            src_domain: command.dst_domain(),
            src_port: command.dst_port(),
            dst_domain: command.src_domain(),
            dst_port: command.src_port(),
            token: command.token(),
            opcode,
            client_data: command.client_data(),
            heap_index: HeapIndex::Default,
            payload_size,
        };
        self.release(command);

        let mut reply = self.alloc_ext(&args)?;
        fill(reply.payload_mut());
        self.async_send(reply).map_err(|SendError { error, packet }| {
            self.release(packet);
            error
        })
    }
}

fn build_static(mut configs: Vec<StaticPoolConfig>) -> Result<Vec<StaticPool>, Error> {
    configs.sort_by_key(|c| c.unit_size);
    configs
        .iter()
        .zip(0u8..)
        .map(|(config, id)| StaticPool::new(PoolId::new(id), config))
        .collect()
}

fn build_dynamic(mut configs: Vec<DynamicPoolConfig>) -> Result<Vec<DynamicPool>, Error> {
    configs.sort_by_key(|c| c.unit_size);
    configs
        .iter()
        .zip(0u8..)
        .map(|(config, id)| DynamicPool::new(PoolId::new(id), config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticPoolConfig;

    fn small() -> DriverConfig {
        DriverConfig::default()
            .with_static_pools([
                StaticPoolConfig::units(256, 2, HeapIndex::Default),
                StaticPoolConfig::units(64, 2, HeapIndex::Default),
            ])
            .with_dynamic_pools([])
    }

    #[test]
    fn driver_is_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<Driver>();
        check::<Packet>();
    }

    #[test]
    fn pools_are_searched_smallest_first() {
        let drv = Driver::init(small(), []).unwrap();
        let info = drv.pool_info();
        assert_eq!(info[0].unit_size, 64);
        assert_eq!(info[1].unit_size, 256);

        let p = drv.alloc(8, HeapIndex::Default).unwrap();
        assert_eq!(p.origin(), Origin::Static { pool: PoolId::new(0), unit: gpr_memq::UnitId::new(0) });
        drv.free(p).unwrap();
    }

    #[test]
    fn exhausted_pool_falls_through_to_larger() {
        let drv = Driver::init(small(), []).unwrap();
        let a = drv.alloc(8, HeapIndex::Default).unwrap();
        let b = drv.alloc(8, HeapIndex::Default).unwrap();
        let c = drv.alloc(8, HeapIndex::Default).unwrap();
        assert!(matches!(c.origin(), Origin::Static { pool, .. } if pool == PoolId::new(1)));
        for p in [a, b, c] {
            drv.free(p).unwrap();
        }
    }

    #[test]
    fn too_many_pools() {
        let config = DriverConfig::default().with_static_pools(
            [StaticPoolConfig::units(64, 1, HeapIndex::Default); MAX_PACKET_POOLS],
        );
        assert_eq!(Driver::init(config, []).err(), Some(Error::BadParameter));
    }

    #[test]
    fn host_gets_local_route() {
        let drv = Driver::init(small(), []).unwrap();
        assert!(drv.route(DomainId::APPS).is_some());
        assert!(drv.route(DomainId::ADSP).is_none());
        assert!(drv.route(DomainId::new(200)).is_none());
    }

    #[test]
    fn unroutable_host_is_rejected() {
        let config = small().with_host_domain(DomainId::INVALID);
        assert_eq!(Driver::init(config, []).err(), Some(Error::BadParameter));
    }
}

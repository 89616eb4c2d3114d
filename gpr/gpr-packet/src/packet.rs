use crate::header::{HEADER_BYTES, HeaderError, HeaderWord, MAX_PACKET_SIZE, PacketHeader, read_u32, write_u32};
use crate::ids::{DomainId, PoolId};
use alloc::vec::Vec;
use core::fmt;
use gpr_memq::{NodeId, UnitId};

/// Where a packet's bytes came from, and therefore where `free` sends them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A unit of a static pool.
    Static { pool: PoolId, unit: UnitId },
    /// An individually allocated packet tracked by a dynamic pool.
    Dynamic { pool: PoolId, record: NodeId },
    /// A buffer owned by the datalink of `domain`, returned through its
    /// `receive_done`.
    Datalink { domain: DomainId },
}

/// An addressed message: header plus opaque payload, owned bytes.
///
/// The buffer length is always the packet size from header word 0.
pub struct Packet {
    buf: Vec<u8>,
    origin: Origin,
}

impl Packet {
    /// Turn a pool buffer into a fresh packet with `payload_size` bytes of
    /// zeroed payload and a zeroed, stamped header.
    ///
    /// # Errors
    /// [`HeaderError::TooLarge`] if the packet would not fit the size field.
    pub fn stamped(mut buf: Vec<u8>, payload_size: usize, origin: Origin) -> Result<Self, HeaderError> {
        let size = HEADER_BYTES
            .checked_add(payload_size)
            .filter(|&s| s <= MAX_PACKET_SIZE)
            .ok_or(HeaderError::TooLarge(payload_size.saturating_add(HEADER_BYTES)))?;
        let word = HeaderWord::for_size(u32::try_from(size).map_err(|_| HeaderError::TooLarge(size))?);
        buf.clear();
        buf.resize(size, 0);
        write_u32(&mut buf, 0, word.into_bits());
        Ok(Self { buf, origin })
    }

    /// Adopt bytes received by a datalink. The buffer is truncated to the
    /// packet size announced by the header.
    ///
    /// # Errors
    /// [`HeaderError`] if the header does not describe a valid packet within
    /// `buf`. The buffer is dropped in that case.
    pub fn from_datalink(mut buf: Vec<u8>, domain: DomainId) -> Result<Self, HeaderError> {
        let header = PacketHeader::parse(&buf)?;
        buf.truncate(header.word.packet_size() as usize);
        Ok(Self {
            buf,
            origin: Origin::Datalink { domain },
        })
    }

    /// Give up the bytes and origin tag.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Origin) {
        (self.buf, self.origin)
    }

    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn header(&self) -> PacketHeader {
        PacketHeader::read(&self.buf)
    }

    /// Overwrite the whole header, keeping the stamped word 0.
    pub fn set_header(&mut self, header: &PacketHeader) {
        let word = self.word();
        PacketHeader { word, ..*header }.write(&mut self.buf);
    }

    #[inline]
    #[must_use]
    pub fn word(&self) -> HeaderWord {
        HeaderWord::from_bits(read_u32(&self.buf, 0))
    }

    /// Total size in bytes, header included.
    #[inline]
    #[must_use]
    pub const fn packet_size(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.buf.len() - self.word().header_bytes()
    }

    #[inline]
    #[must_use]
    pub fn dst_domain(&self) -> DomainId {
        DomainId::new(self.buf[4])
    }

    #[inline]
    pub fn set_dst_domain(&mut self, domain: DomainId) {
        self.buf[4] = domain.raw();
    }

    #[inline]
    #[must_use]
    pub fn src_domain(&self) -> DomainId {
        DomainId::new(self.buf[5])
    }

    #[inline]
    pub fn set_src_domain(&mut self, domain: DomainId) {
        self.buf[5] = domain.raw();
    }

    #[inline]
    #[must_use]
    pub fn client_data(&self) -> u8 {
        self.buf[6]
    }

    #[inline]
    pub fn set_client_data(&mut self, value: u8) {
        self.buf[6] = value;
    }

    #[inline]
    #[must_use]
    pub fn src_port(&self) -> u32 {
        read_u32(&self.buf, 8)
    }

    #[inline]
    pub fn set_src_port(&mut self, port: u32) {
        write_u32(&mut self.buf, 8, port);
    }

    #[inline]
    #[must_use]
    pub fn dst_port(&self) -> u32 {
        read_u32(&self.buf, 12)
    }

    #[inline]
    pub fn set_dst_port(&mut self, port: u32) {
        write_u32(&mut self.buf, 12, port);
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> u32 {
        read_u32(&self.buf, 16)
    }

    #[inline]
    pub fn set_token(&mut self, token: u32) {
        write_u32(&mut self.buf, 16, token);
    }

    #[inline]
    #[must_use]
    pub fn opcode(&self) -> u32 {
        read_u32(&self.buf, 20)
    }

    #[inline]
    pub fn set_opcode(&mut self, opcode: u32) {
        write_u32(&mut self.buf, 20, opcode);
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf[self.word().header_bytes()..]
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let at = self.word().header_bytes();
        &mut self.buf[at..]
    }

    /// The packet as it goes on the wire.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("src", &(self.src_domain(), self.src_port()))
            .field("dst", &(self.dst_domain(), self.dst_port()))
            .field("token", &format_args!("{:#010x}", self.token()))
            .field("opcode", &format_args!("{:#010x}", self.opcode()))
            .field("size", &self.packet_size())
            .field("origin", &self.origin)
            .finish()
    }
}

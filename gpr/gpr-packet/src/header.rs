//! Header layout and (de)serialisation.

use crate::ids::DomainId;
use bitfield_struct::bitfield;

/// Packet format version understood by this router.
pub const PACKET_VERSION: u8 = 0;

/// Header size of version 0 packets, in 32-bit words.
pub const HEADER_WORDS: u8 = 6;

/// Header size of version 0 packets, in bytes.
pub const HEADER_BYTES: usize = HEADER_WORDS as usize * 4;

/// Largest packet the 24-bit size field can describe.
pub const MAX_PACKET_SIZE: usize = (1 << 24) - 1;

/// Word 0: version, header size and packet size.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct HeaderWord {
    /// Packet format version (bits 0..3).
    #[bits(4)]
    pub version: u8,
    /// Header size in 32-bit words (bits 4..7).
    #[bits(4)]
    pub header_words: u8,
    /// Total packet size in bytes, header included (bits 8..31).
    #[bits(24)]
    pub packet_size: u32,
}

impl HeaderWord {
    /// Word 0 of a version 0 packet carrying `packet_size` bytes.
    ///
    /// `packet_size` must not exceed [`MAX_PACKET_SIZE`].
    #[inline]
    #[must_use]
    pub const fn for_size(packet_size: u32) -> Self {
        Self::new()
            .with_version(PACKET_VERSION)
            .with_header_words(HEADER_WORDS)
            .with_packet_size(packet_size)
    }

    /// Header size in bytes.
    #[inline]
    #[must_use]
    pub const fn header_bytes(self) -> usize {
        self.header_words() as usize * 4
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("buffer of {len} bytes is shorter than a packet header")]
    TooShort { len: usize },
    #[error("unsupported packet version {0}")]
    BadVersion(u8),
    #[error("header size of {0} words is invalid")]
    BadHeaderSize(u8),
    #[error("packet size {claimed} disagrees with header ({header}) or buffer ({available}) size")]
    SizeMismatch {
        claimed: usize,
        header: usize,
        available: usize,
    },
    #[error("packet of {0} bytes exceeds the 24-bit size field")]
    TooLarge(usize),
}

/// Decoded copy of a packet header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub word: HeaderWord,
    pub dst_domain: DomainId,
    pub src_domain: DomainId,
    pub client_data: u8,
    pub src_port: u32,
    pub dst_port: u32,
    pub token: u32,
    pub opcode: u32,
}

impl PacketHeader {
    /// Parse and validate the header at the start of `bytes`.
    ///
    /// # Errors
    /// [`HeaderError`] if the buffer is too short, the version or header size
    /// is not understood, or the packet size is smaller than the header or
    /// larger than the buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_BYTES {
            return Err(HeaderError::TooShort { len: bytes.len() });
        }
        let word = HeaderWord::from_bits(read_u32(bytes, 0));
        if word.version() != PACKET_VERSION {
            return Err(HeaderError::BadVersion(word.version()));
        }
        if word.header_words() != HEADER_WORDS {
            return Err(HeaderError::BadHeaderSize(word.header_words()));
        }
        let claimed = word.packet_size() as usize;
        if claimed < word.header_bytes() || claimed > bytes.len() {
            return Err(HeaderError::SizeMismatch {
                claimed,
                header: word.header_bytes(),
                available: bytes.len(),
            });
        }
        Ok(Self::read(bytes))
    }

    /// Read the header fields without validation.
    ///
    /// `bytes` must hold at least [`HEADER_BYTES`].
    #[must_use]
    pub(crate) fn read(bytes: &[u8]) -> Self {
        Self {
            word: HeaderWord::from_bits(read_u32(bytes, 0)),
            dst_domain: DomainId::new(bytes[4]),
            src_domain: DomainId::new(bytes[5]),
            client_data: bytes[6],
            src_port: read_u32(bytes, 8),
            dst_port: read_u32(bytes, 12),
            token: read_u32(bytes, 16),
            opcode: read_u32(bytes, 20),
        }
    }

    /// Serialise into the first [`HEADER_BYTES`] of `bytes`.
    pub fn write(&self, bytes: &mut [u8]) {
        self.words()
            .iter()
            .zip(bytes[..HEADER_BYTES].chunks_exact_mut(4))
            .for_each(|(w, out)| out.copy_from_slice(&w.to_le_bytes()));
    }

    /// The six raw header words, as they appear on the wire.
    #[must_use]
    pub fn words(&self) -> [u32; HEADER_WORDS as usize] {
        let routing = u32::from_le_bytes([
            self.dst_domain.raw(),
            self.src_domain.raw(),
            self.client_data,
            0,
        ]);
        [
            self.word.into_bits(),
            routing,
            self.src_port,
            self.dst_port,
            self.token,
            self.opcode,
        ]
    }
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
pub(crate) fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_zero_bit_positions() {
        let w = HeaderWord::for_size(0x0001_0020);
        // size in bits 8..31, six header words in bits 4..7, version 0
        assert_eq!(w.into_bits(), 0x0100_2060);
        assert_eq!(w.header_bytes(), 24);
    }

    #[test]
    fn write_then_parse() {
        let h = PacketHeader {
            word: HeaderWord::for_size(28),
            dst_domain: DomainId::ADSP,
            src_domain: DomainId::APPS,
            client_data: 0x5A,
            src_port: 100,
            dst_port: 200,
            token: 0xAABB_CCDD,
            opcode: 0x0102_0304,
        };
        let mut bytes = [0u8; 28];
        h.write(&mut bytes);
        assert_eq!(&bytes[4..8], &[2, 3, 0x5A, 0]);
        assert_eq!(PacketHeader::parse(&bytes), Ok(h));
    }

    #[test]
    fn parse_rejects_inconsistent_sizes() {
        let mut bytes = [0u8; 24];
        assert_eq!(
            PacketHeader::parse(&bytes[..10]),
            Err(HeaderError::TooShort { len: 10 })
        );

        write_u32(&mut bytes, 0, HeaderWord::for_size(16).into_bits());
        assert!(matches!(
            PacketHeader::parse(&bytes),
            Err(HeaderError::SizeMismatch { claimed: 16, .. })
        ));

        write_u32(&mut bytes, 0, HeaderWord::for_size(64).into_bits());
        assert!(matches!(
            PacketHeader::parse(&bytes),
            Err(HeaderError::SizeMismatch { claimed: 64, .. })
        ));

        write_u32(&mut bytes, 0, HeaderWord::for_size(24).with_version(1).into_bits());
        assert_eq!(PacketHeader::parse(&bytes), Err(HeaderError::BadVersion(1)));

        write_u32(&mut bytes, 0, HeaderWord::for_size(24).with_header_words(4).into_bits());
        assert_eq!(PacketHeader::parse(&bytes), Err(HeaderError::BadHeaderSize(4)));
    }
}

//! # GPR packets
//!
//! A packet is a 24-byte header followed by an opaque payload:
//!
//! ```text
//!  word  31                      8 7      4 3      0
//!       +-------------------------+--------+--------+
//!   0   |   packet size (bytes)   | hdr wds| version|
//!       +--------+--------+-------+--------+--------+
//!   1   |reserved|cli data| src domain | dst domain  |
//!       +--------+--------+-------------------------+
//!   2   |                 src port                  |
//!   3   |                 dst port                  |
//!   4   |                  token                    |
//!   5   |                  opcode                   |
//!       +-------------------------------------------+
//!       |            payload (size − 24)            |
//!       +-------------------------------------------+
//! ```
//!
//! All words are little-endian. [`Packet`] owns the bytes and remembers where
//! they came from ([`Origin`]) so that the driver can return them to the right
//! pool or datalink.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod header;
pub mod ids;
pub mod opcodes;
pub mod packet;
pub mod status;

pub use header::{HEADER_BYTES, HEADER_WORDS, HeaderError, HeaderWord, MAX_PACKET_SIZE, PACKET_VERSION, PacketHeader};
pub use ids::{DomainId, HeapIndex, MAX_DOMAIN_ID, PoolId};
pub use packet::{Origin, Packet};
pub use status::Status;

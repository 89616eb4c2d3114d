//! Basic response opcodes every GPR endpoint understands.

use crate::header::{read_u32, write_u32};
use crate::status::Status;

/// Command completion: payload is [`BasicResult`].
pub const IBASIC_RSP_RESULT: u32 = 0x0200_1005;

/// Command accepted, completion follows later: payload is [`BasicAccepted`].
pub const IBASIC_EVT_ACCEPTED: u32 = 0x0200_1006;

/// Payload of [`IBASIC_RSP_RESULT`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BasicResult {
    /// Opcode of the command being completed.
    pub opcode: u32,
    pub status: Status,
}

impl BasicResult {
    pub const SIZE: usize = 8;

    pub fn write(&self, out: &mut [u8]) {
        write_u32(out, 0, self.opcode);
        write_u32(out, 4, self.status);
    }

    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        (bytes.len() >= Self::SIZE).then(|| Self {
            opcode: read_u32(bytes, 0),
            status: read_u32(bytes, 4),
        })
    }
}

/// Payload of [`IBASIC_EVT_ACCEPTED`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BasicAccepted {
    pub opcode: u32,
}

impl BasicAccepted {
    pub const SIZE: usize = 4;

    pub fn write(&self, out: &mut [u8]) {
        write_u32(out, 0, self.opcode);
    }

    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        (bytes.len() >= Self::SIZE).then(|| Self {
            opcode: read_u32(bytes, 0),
        })
    }
}

//! Status codes carried in response payloads.

/// Wire status value.
pub type Status = u32;

pub const EOK: Status = 0;
pub const EFAILED: Status = 1;
pub const EBADPARAM: Status = 2;
pub const EUNSUPPORTED: Status = 3;
pub const EVERSION: Status = 4;
pub const EUNEXPECTED: Status = 5;
pub const ENORESOURCE: Status = 7;
pub const EHANDLE: Status = 8;
pub const EALREADY: Status = 9;
pub const ENOTREADY: Status = 10;
pub const EBUSY: Status = 12;
pub const ENOMEMORY: Status = 18;
pub const ENOTEXIST: Status = 19;

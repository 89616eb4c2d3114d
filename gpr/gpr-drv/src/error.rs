use gpr_memq::{ListError, MemqError};
use gpr_packet::HeaderError;
use gpr_packet::Status;
use gpr_packet::status::{EALREADY, EBADPARAM, EFAILED, ENORESOURCE, ENOTEXIST, EUNSUPPORTED};
use gpr_session::SessionError;

/// Failure kinds of the router core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("bad parameter")]
    BadParameter,
    #[error("no resource available")]
    ResourceExhausted,
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// A datalink's send or receive-done reported a failure status.
    #[error("transport failed with status {0}")]
    Transport(Status),
    #[error("list corruption detected")]
    Corruption,
    #[error("unsupported")]
    Unsupported,
}

impl Error {
    /// The status code carried in response payloads.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::BadParameter => EBADPARAM,
            Self::ResourceExhausted => ENORESOURCE,
            Self::NotFound => ENOTEXIST,
            Self::AlreadyExists => EALREADY,
            Self::Transport(_) | Self::Corruption => EFAILED,
            Self::Unsupported => EUNSUPPORTED,
        }
    }
}

impl From<ListError> for Error {
    fn from(e: ListError) -> Self {
        match e {
            ListError::BadParam => Self::BadParameter,
            ListError::Empty | ListError::NotLinked => Self::NotFound,
            ListError::AlreadyLinked | ListError::Corrupted { .. } => Self::Corruption,
        }
    }
}

impl From<MemqError> for Error {
    fn from(e: MemqError) -> Self {
        match e {
            MemqError::List(e) => e.into(),
            MemqError::Exhausted => Self::ResourceExhausted,
            _ => Self::BadParameter,
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AlreadyExists(_) => Self::AlreadyExists,
            SessionError::NotFound(_) => Self::NotFound,
            SessionError::NoFreeSlot => Self::ResourceExhausted,
            SessionError::BadConfig { .. } => Self::BadParameter,
            SessionError::Corrupted => Self::Corruption,
        }
    }
}

impl From<HeaderError> for Error {
    fn from(_: HeaderError) -> Self {
        Self::BadParameter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::BadParameter.status(), 2);
        assert_eq!(Error::ResourceExhausted.status(), 7);
        assert_eq!(Error::NotFound.status(), 19);
        assert_eq!(Error::AlreadyExists.status(), 9);
        assert_eq!(Error::Transport(42).status(), 1);
    }

    #[test]
    fn lower_errors_convert() {
        assert_eq!(Error::from(SessionError::NoFreeSlot), Error::ResourceExhausted);
        assert_eq!(
            Error::from(MemqError::List(ListError::Corrupted { node: 3 })),
            Error::Corruption
        );
        assert_eq!(Error::from(MemqError::AlreadyFree(1)), Error::BadParameter);
        assert_eq!(Error::from(MemqError::ForeignBuffer(1)), Error::BadParameter);
        assert_eq!(Error::from(MemqError::Exhausted), Error::ResourceExhausted);
        assert_eq!(Error::from(HeaderError::BadVersion(2)), Error::BadParameter);
    }
}

//! # GPR session registry
//!
//! Maps a 32-bit module port to the session registered for it. Two backing
//! tables implement the same [`SessionTable`] contract:
//!
//! * [`LinearTable`]: a fixed array of slots, scanned in full. Bounded; a full
//!   table rejects further registrations.
//! * [`HashedTable`]: `slots − 1` buckets indexed by `port % (slots − 1)`, each
//!   bucket a chained list. Chains are bounded only by memory.
//!
//! A [`Registry`] bundles the table chosen by [`Strategy`] with the heap index
//! it serves and the task lock that guards it.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod hashed;
mod linear;
mod registry;

pub use hashed::HashedTable;
pub use linear::LinearTable;
pub use registry::{Registry, Strategy};

/// A registration: port plus whatever the owner keeps per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<S> {
    pub port: u32,
    pub session: S,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("port {0:#010x} is already registered")]
    AlreadyExists(u32),
    #[error("port {0:#010x} is not registered")]
    NotFound(u32),
    #[error("no free session slot")]
    NoFreeSlot,
    #[error("a {strategy:?} table cannot have {slots} slots")]
    BadConfig { strategy: Strategy, slots: usize },
    #[error("session chain is corrupted")]
    Corrupted,
}

/// Contract shared by both backing tables.
pub trait SessionTable<S> {
    /// # Errors
    /// [`SessionError::AlreadyExists`] for a duplicate port,
    /// [`SessionError::NoFreeSlot`] if a bounded table is full.
    fn register(&mut self, port: u32, session: S) -> Result<(), SessionError>;

    /// # Errors
    /// [`SessionError::NotFound`] if `port` is not registered.
    fn get(&self, port: u32) -> Result<&S, SessionError>;

    /// # Errors
    /// [`SessionError::NotFound`] if `port` is not registered.
    fn deregister(&mut self, port: u32) -> Result<S, SessionError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, port: u32) -> bool {
        self.get(port).is_ok()
    }

    /// Registered ports, in table order.
    fn ports(&self) -> impl Iterator<Item = u32> + '_;
}

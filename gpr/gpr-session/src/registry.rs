use crate::{HashedTable, LinearTable, SessionError, SessionTable};
use alloc::vec::Vec;
use gpr_packet::HeapIndex;
use gpr_sync::TaskMutex;
use log::{debug, error, warn};

/// Backing table layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Bounded array, scanned linearly.
    #[default]
    Linear,
    /// `port % (slots − 1)` buckets with chaining.
    Hashed,
}

enum Table<S> {
    Linear(LinearTable<S>),
    Hashed(HashedTable<S>),
}

macro_rules! dispatch {
    ($table:expr, $t:ident => $body:expr) => {
        match $table {
            Table::Linear($t) => $body,
            Table::Hashed($t) => $body,
        }
    };
}

/// A session table for one heap index, behind the task lock.
pub struct Registry<S> {
    heap: HeapIndex,
    strategy: Strategy,
    table: TaskMutex<Table<S>>,
}

impl<S: Clone> Registry<S> {
    /// # Errors
    /// [`SessionError::BadConfig`] if `slots` is unusable for `strategy`.
    pub fn new(heap: HeapIndex, strategy: Strategy, slots: usize) -> Result<Self, SessionError> {
        let table = match strategy {
            Strategy::Linear if slots == 0 => {
                return Err(SessionError::BadConfig { strategy, slots });
            }
            Strategy::Linear => Table::Linear(LinearTable::new(slots)),
            Strategy::Hashed => Table::Hashed(HashedTable::new(slots)?),
        };
        Ok(Self {
            heap,
            strategy,
            table: TaskMutex::new(table),
        })
    }

    #[inline]
    #[must_use]
    pub const fn heap_index(&self) -> HeapIndex {
        self.heap
    }

    #[inline]
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// # Errors
    /// See [`SessionTable::register`].
    pub fn register(&self, port: u32, session: S) -> Result<(), SessionError> {
        let result = self
            .table
            .with_lock(|t| dispatch!(t, t => t.register(port, session)));
        match &result {
            Ok(()) => debug!("session: port {port:#010x} registered on {:?} heap", self.heap),
            Err(SessionError::Corrupted) => {
                error!("session: table on {:?} heap is corrupted, {port:#010x} not registered", self.heap);
            }
            Err(e) => warn!("session: register {port:#010x} on {:?} heap failed: {e}", self.heap),
        }
        result
    }

    /// Clone of the session registered for `port`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if `port` is not registered.
    pub fn get(&self, port: u32) -> Result<S, SessionError> {
        self.table
            .with_lock(|t| dispatch!(t, t => t.get(port).cloned()))
    }

    /// # Errors
    /// [`SessionError::NotFound`] if `port` is not registered.
    pub fn deregister(&self, port: u32) -> Result<S, SessionError> {
        let result = self
            .table
            .with_lock(|t| dispatch!(t, t => t.deregister(port)));
        match &result {
            Ok(_) => debug!("session: port {port:#010x} deregistered from {:?} heap", self.heap),
            Err(SessionError::Corrupted) => {
                error!("session: table on {:?} heap is corrupted, {port:#010x} not deregistered", self.heap);
            }
            Err(e) => warn!("session: deregister {port:#010x} on {:?} heap: {e}", self.heap),
        }
        result
    }

    #[must_use]
    pub fn contains(&self, port: u32) -> bool {
        self.table.with_lock(|t| dispatch!(t, t => t.contains(port)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.with_lock(|t| dispatch!(t, t => t.len()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered ports.
    #[must_use]
    pub fn ports(&self) -> Vec<u32> {
        self.table
            .with_lock(|t| dispatch!(t, t => t.ports().collect()))
    }
}

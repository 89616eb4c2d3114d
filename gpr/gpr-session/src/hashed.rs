use crate::{Entry, SessionError, SessionTable};
use alloc::vec::Vec;
use gpr_memq::{List, ListError};

/// Buckets of chained entries, bucket = `port % buckets`.
pub struct HashedTable<S> {
    buckets: Vec<List<Entry<S>>>,
    len: usize,
}

impl<S> HashedTable<S> {
    /// `slots` is the configured table size; `slots − 1` buckets are used.
    ///
    /// # Errors
    /// [`SessionError::BadConfig`] if `slots < 2`.
    pub fn new(slots: usize) -> Result<Self, SessionError> {
        if slots < 2 {
            return Err(SessionError::BadConfig {
                strategy: crate::Strategy::Hashed,
                slots,
            });
        }
        let mut buckets = Vec::with_capacity(slots - 1);
        buckets.resize_with(slots - 1, List::new);
        Ok(Self { buckets, len: 0 })
    }

    #[inline]
    fn bucket(&self, port: u32) -> usize {
        port as usize % self.buckets.len()
    }

    /// Longest chain; a rough measure of how well ports spread.
    #[must_use]
    pub fn max_chain(&self) -> usize {
        self.buckets.iter().map(List::len).max().unwrap_or(0)
    }
}

impl<S> SessionTable<S> for HashedTable<S> {
    fn register(&mut self, port: u32, session: S) -> Result<(), SessionError> {
        let b = self.bucket(port);
        let chain = &mut self.buckets[b];
        if chain.iter().any(|(_, e)| e.port == port) {
            return Err(SessionError::AlreadyExists(port));
        }
        chain
            .add_tail(Entry { port, session })
            .map_err(|_| SessionError::Corrupted)?;
        self.len += 1;
        Ok(())
    }

    fn get(&self, port: u32) -> Result<&S, SessionError> {
        self.buckets[self.bucket(port)]
            .iter()
            .find(|(_, e)| e.port == port)
            .map(|(_, e)| &e.session)
            .ok_or(SessionError::NotFound(port))
    }

    fn deregister(&mut self, port: u32) -> Result<S, SessionError> {
        let b = self.bucket(port);
        let chain = &mut self.buckets[b];
        let id = chain
            .iter()
            .find(|(_, e)| e.port == port)
            .map(|(id, _)| id)
            .ok_or(SessionError::NotFound(port))?;
        let entry = chain.remove(id).map_err(|e| match e {
            ListError::BadParam | ListError::NotLinked => SessionError::NotFound(port),
            _ => SessionError::Corrupted,
        })?;
        self.len -= 1;
        Ok(entry.session)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|(_, e)| e.port))
    }
}

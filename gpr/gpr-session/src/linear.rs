use crate::{Entry, SessionError, SessionTable};
use alloc::vec::Vec;

/// Fixed array of slots; every operation scans it.
pub struct LinearTable<S> {
    slots: Vec<Option<Entry<S>>>,
    len: usize,
}

impl<S> LinearTable<S> {
    #[must_use]
    pub fn new(slots: usize) -> Self {
        let mut v = Vec::with_capacity(slots);
        v.resize_with(slots, || None);
        Self { slots: v, len: 0 }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn position(&self, port: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.port == port))
    }
}

impl<S> SessionTable<S> for LinearTable<S> {
    fn register(&mut self, port: u32, session: S) -> Result<(), SessionError> {
        // The duplicate check must see every slot, so it cannot stop at the
        // first hole.
        if self.position(port).is_some() {
            return Err(SessionError::AlreadyExists(port));
        }
        let hole = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(SessionError::NoFreeSlot)?;
        *hole = Some(Entry { port, session });
        self.len += 1;
        Ok(())
    }

    fn get(&self, port: u32) -> Result<&S, SessionError> {
        self.slots
            .iter()
            .flatten()
            .find(|e| e.port == port)
            .map(|e| &e.session)
            .ok_or(SessionError::NotFound(port))
    }

    fn deregister(&mut self, port: u32) -> Result<S, SessionError> {
        let at = self.position(port).ok_or(SessionError::NotFound(port))?;
        let entry = self.slots[at].take().ok_or(SessionError::NotFound(port))?;
        self.len -= 1;
        Ok(entry.session)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().flatten().map(|e| e.port)
    }
}

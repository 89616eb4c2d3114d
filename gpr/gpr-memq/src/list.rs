//! Circular doubly-linked list with a sentinel, stored in a node arena.
//!
//! The layout mirrors the classic intrusive list, but links are arena
//! indices instead of pointers:
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//! +-------------+    +----------+    +----------+       │
//! | [0] sentinel|───►|  [3] A   |───►|  [1] B   |───────┘
//! +-------------+◄───+----------+◄───+----------+
//!        ▲                                    │ prev
//!        └────────────────────────────────────┘
//! ```
//!
//! A node that is not in the list links to itself. Nodes can be created
//! detached ([`List::insert`]) and moved in and out of the list repeatedly
//! ([`List::push_back`], [`List::unlink`]) without touching the arena, which
//! is what the memq free list relies on.
//!
//! # Invariants
//! - `nodes[0]` is the sentinel and never carries a value.
//! - For every linked node `n`: `nodes[n.prev].next == n` and
//!   `nodes[n.next].prev == n`.
//! - A detached node has `prev == next == self`.

use alloc::vec::Vec;
use gpr_sync::{Mutex, RawLock, RawUnlock};

const SENTINEL: usize = 0;

/// Handle to a node; stale once the node is removed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Arena slot of the node (never 0).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("node handle is stale or out of range")]
    BadParam,
    #[error("list is empty")]
    Empty,
    #[error("node is already linked into a list")]
    AlreadyLinked,
    #[error("node is not linked into the list")]
    NotLinked,
    #[error("list linkage is corrupted at node {node}")]
    Corrupted { node: u32 },
}

struct Node<T> {
    prev: usize,
    next: usize,
    generation: u32,
    value: Option<T>,
}

impl<T> Node<T> {
    const fn detached(at: usize, generation: u32, value: Option<T>) -> Self {
        Self {
            prev: at,
            next: at,
            generation,
            value,
        }
    }
}

pub struct List<T> {
    nodes: Vec<Node<T>>,
    /// Released arena slots, reused by `insert`.
    vacant: Vec<usize>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Reserve room for `capacity` nodes besides the sentinel.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 1);
        nodes.push(Node::detached(SENTINEL, 0, None));
        Self {
            nodes,
            vacant: Vec::new(),
            len: 0,
        }
    }

    /// Number of linked nodes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Create a detached node holding `value`.
    pub fn insert(&mut self, value: T) -> NodeId {
        if let Some(at) = self.vacant.pop() {
            let generation = self.nodes[at].generation;
            self.nodes[at] = Node::detached(at, generation, Some(value));
            return Self::id(at, generation);
        }
        let at = self.nodes.len();
        self.nodes.push(Node::detached(at, 0, Some(value)));
        Self::id(at, 0)
    }

    /// Create a node and link it at the tail.
    ///
    /// # Errors
    /// [`ListError::Corrupted`] if the current tail does not link back to the
    /// sentinel; the new node is released again in that case.
    pub fn add_tail(&mut self, value: T) -> Result<NodeId, ListError> {
        let id = self.insert(value);
        match self.push_back(id) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.release(id.index as usize);
                Err(e)
            }
        }
    }

    /// Link an existing detached node at the tail.
    ///
    /// # Errors
    /// - [`ListError::BadParam`] for a stale handle.
    /// - [`ListError::AlreadyLinked`] if the node is in the list already
    ///   (also a `debug_assert!` failure, as it indicates a double insert).
    /// - [`ListError::Corrupted`] if the tail does not link back to the sentinel.
    pub fn push_back(&mut self, id: NodeId) -> Result<(), ListError> {
        let at = self.slot(id)?;
        let linked = self.is_linked_at(at);
        debug_assert!(!linked, "node {at} is already linked");
        if linked {
            return Err(ListError::AlreadyLinked);
        }
        let tail = self.nodes[SENTINEL].prev;
        if self.nodes[tail].next != SENTINEL {
            return Err(Self::corrupted(tail));
        }
        self.nodes[at].prev = tail;
        self.nodes[at].next = SENTINEL;
        self.nodes[tail].next = at;
        self.nodes[SENTINEL].prev = at;
        self.len += 1;
        Ok(())
    }

    /// Peek at the head without unlinking it.
    #[must_use]
    pub fn front(&self) -> Option<NodeId> {
        let head = self.nodes[SENTINEL].next;
        (head != SENTINEL).then(|| Self::id(head, self.nodes[head].generation))
    }

    /// Unlink the head node; the node stays allocated.
    ///
    /// # Errors
    /// [`ListError::Empty`], or [`ListError::Corrupted`] if the head's links
    /// are inconsistent.
    pub fn pop_front(&mut self) -> Result<NodeId, ListError> {
        let id = self.front().ok_or(ListError::Empty)?;
        self.unlink(id)?;
        Ok(id)
    }

    /// Unlink `id` from the list; the node stays allocated and detached.
    ///
    /// # Errors
    /// - [`ListError::BadParam`] for a stale handle.
    /// - [`ListError::NotLinked`] if the node is detached.
    /// - [`ListError::Corrupted`] if a neighbour does not link back.
    pub fn unlink(&mut self, id: NodeId) -> Result<(), ListError> {
        let at = self.slot(id)?;
        if !self.is_linked_at(at) {
            return Err(ListError::NotLinked);
        }
        let (prev, next) = (self.nodes[at].prev, self.nodes[at].next);
        if prev >= self.nodes.len()
            || next >= self.nodes.len()
            || self.nodes[prev].next != at
            || self.nodes[next].prev != at
        {
            return Err(Self::corrupted(at));
        }
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[at].prev = at;
        self.nodes[at].next = at;
        self.len -= 1;
        Ok(())
    }

    /// Unlink (if linked) and release a node, returning its value.
    ///
    /// # Errors
    /// As [`unlink`](Self::unlink), except that detached nodes are fine.
    pub fn remove(&mut self, id: NodeId) -> Result<T, ListError> {
        let at = self.slot(id)?;
        if self.is_linked_at(at) {
            self.unlink(id)?;
        }
        self.release(at).ok_or(ListError::BadParam)
    }

    /// Unlink and release the head node.
    ///
    /// # Errors
    /// As [`pop_front`](Self::pop_front).
    pub fn remove_head(&mut self) -> Result<T, ListError> {
        let id = self.pop_front()?;
        self.remove(id)
    }

    /// Whether `id` is currently linked.
    ///
    /// # Errors
    /// [`ListError::BadParam`] for a stale handle.
    pub fn is_linked(&self, id: NodeId) -> Result<bool, ListError> {
        self.slot(id).map(|at| self.is_linked_at(at))
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        let at = self.slot(id).ok()?;
        self.nodes[at].value.as_ref()
    }

    #[must_use]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let at = self.slot(id).ok()?;
        self.nodes[at].value.as_mut()
    }

    /// Release every node, linked or detached. Outstanding handles go stale.
    pub fn clear(&mut self) {
        for at in 1..self.nodes.len() {
            if self.nodes[at].value.is_some() {
                self.release(at);
            }
        }
        self.nodes[SENTINEL] = Node::detached(SENTINEL, 0, None);
        self.len = 0;
    }

    /// Walk the linked nodes head to tail.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            at: self.nodes[SENTINEL].next,
            remaining: self.len,
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    const fn id(at: usize, generation: u32) -> NodeId {
        NodeId {
            index: at as u32,
            generation,
        }
    }

    fn slot(&self, id: NodeId) -> Result<usize, ListError> {
        let at = id.index as usize;
        match self.nodes.get(at) {
            Some(node)
                if at != SENTINEL && node.generation == id.generation && node.value.is_some() =>
            {
                Ok(at)
            }
            _ => Err(ListError::BadParam),
        }
    }

    #[inline]
    fn is_linked_at(&self, at: usize) -> bool {
        let node = &self.nodes[at];
        node.next != at || node.prev != at
    }

    fn release(&mut self, at: usize) -> Option<T> {
        let node = &mut self.nodes[at];
        let value = node.value.take()?;
        node.prev = at;
        node.next = at;
        node.generation = node.generation.wrapping_add(1);
        self.vacant.push(at);
        Some(value)
    }

    /// Callers usually hold a lock around the list, so the error is returned
    /// for them to log once it is released.
    #[allow(clippy::cast_possible_truncation)]
    const fn corrupted(at: usize) -> ListError {
        ListError::Corrupted { node: at as u32 }
    }
}

pub struct Iter<'a, T> {
    list: &'a List<T>,
    at: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        // `remaining` bounds the walk even if a cycle skips the sentinel.
        if self.at == SENTINEL || self.remaining == 0 {
            return None;
        }
        let node = self.list.nodes.get(self.at)?;
        let id = List::<T>::id(self.at, node.generation);
        self.at = node.next;
        self.remaining -= 1;
        node.value.as_ref().map(|v| (id, v))
    }
}

/// A [`List`] whose every operation runs under a lock of type `R`.
pub struct SharedList<T, R> {
    inner: Mutex<List<T>, R>,
}

impl<T, R> SharedList<T, R>
where
    R: RawLock + RawUnlock,
{
    #[must_use]
    pub const fn from_raw(raw: R, list: List<T>) -> Self {
        Self {
            inner: Mutex::from_raw(raw, list),
        }
    }

    /// # Errors
    /// See [`List::add_tail`].
    pub fn add_tail(&self, value: T) -> Result<NodeId, ListError> {
        self.with(|l| l.add_tail(value))
    }

    /// # Errors
    /// See [`List::remove_head`].
    pub fn remove_head(&self) -> Result<T, ListError> {
        self.with(List::remove_head)
    }

    /// # Errors
    /// See [`List::remove`].
    pub fn delete(&self, id: NodeId) -> Result<T, ListError> {
        self.with(|l| l.remove(id))
    }

    #[must_use]
    pub fn get_head(&self) -> Option<NodeId> {
        self.with(|l| l.front())
    }

    pub fn clear(&self) {
        self.with(List::clear);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(|l| l.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` with the list's lock held.
    pub fn with<U>(&self, f: impl FnOnce(&mut List<T>) -> U) -> U {
        self.inner.with_lock(f)
    }

    /// Run `f` with the lock held and interrupts masked; for lists that an
    /// interrupt handler also touches.
    pub fn with_isr<U>(&self, f: impl FnOnce(&mut List<T>) -> U) -> U {
        self.inner.with_isr_lock(f)
    }

    /// Lock state at the time of the call; diagnostics only.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

//! # GPR packet memory queues
//!
//! Two layers, bottom-up:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 MemqBlock                           │
//! │    • heap_size / unit_size fixed units              │
//! │    • per-unit metadata words (owner tag)            │
//! │    • O(1) alloc / free through the free list        │
//! │    • owner tally when the block runs dry            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 List<T>                             │
//! │    • circular doubly-linked list, sentinel node 0   │
//! │    • index links inside a node arena                │
//! │    • generation-checked NodeId handles              │
//! │    • back-link verification on insert / delete      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! [`SharedList`] puts a [`List`] behind one of the `gpr-sync` lock domains so
//! every operation runs with the lock held; [`SharedList::with_isr`] also masks
//! interrupts for lists an interrupt handler touches.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod list;
pub mod memq;

pub use list::{List, ListError, NodeId, SharedList};
pub use memq::{MemqBlock, MemqError, OwnerCount, UnitId};

//! # GPR driver core
//!
//! Packet lifecycle and routing for one domain:
//!
//! ```text
//!            alloc / alloc_ext                     free / send_done
//!   caller ───────────────────▶ [allocated] ─────────────────────────▶ pool
//!                                    │                                  ▲
//!                                    │ async_send                       │
//!                                    ▼                                  │
//!                              [in flight] ── route[dst_domain] ──┐     │
//!                                                                 │     │
//!              ┌──────────── host domain ─────────┬─ remote ──────┘     │
//!              ▼                                  ▼                     │
//!         LocalLink: session(dst_port)       Transport::send            │
//!         callback(&Driver, packet) ─────────────────────────────────────┘
//! ```
//!
//! * Packets come from **static pools** (a [`gpr_memq::MemqBlock`] each) or
//!   **dynamic pools** (individually allocated, tracked in a list), or from a
//!   datalink via [`Driver::receive`]. Every [`Packet`](gpr_packet::Packet)
//!   carries its [`Origin`](gpr_packet::Origin), which [`Driver::free`]
//!   dispatches on.
//! * Static units carry an owner tag: the source port after
//!   [`Driver::alloc_ext`], the destination port while in flight, back to the
//!   source port if the send fails, and zero once freed. An exhausted pool
//!   logs every owner with the number of units it holds.
//! * Ports resolve through two session registries. The alternate-heap
//!   registry is searched before the default one.
//!
//! Pools and the packet log live behind the ISR lock, the registries behind
//! the task lock (see `gpr-sync`). No lock is held across a transport call or
//! a session callback.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod config;
mod driver;
mod dynamic;
mod error;
mod local;
pub mod packet_log;
mod pool;
mod transport;

pub use config::{Clock, DriverConfig, DynamicPoolConfig, StaticPoolConfig};
pub use driver::{AllocArgs, Callback, Driver};
pub use error::Error;
pub use gpr_session::Strategy;
pub use local::LocalLink;
pub use packet_log::{Direction, LogEntry};
pub use pool::{PoolInfo, PoolKind};
pub use transport::{DatalinkConfig, SendError, Transport};

/// Most packet pools, static and dynamic together, one driver may have.
pub const MAX_PACKET_POOLS: usize = 8;

/// Metadata words per static-pool unit: the owner tag.
pub const OWNER_METADATA_WORDS: usize = 1;

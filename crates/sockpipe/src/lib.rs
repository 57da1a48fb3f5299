// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sockpipe - handle-based sockets and pipe channels
//!
//! Two small resource managers for single-threaded polling applications:
//!
//! - [`SocketTable`]: a fixed number of stream sockets (Unix-domain,
//!   TCP/IPv4, TCP/IPv6) behind integer-like handles, with lazy accept on
//!   servers and lazy connect plus reconnect-on-failure on clients.
//! - [`PipeManager`]: a bounded sequence of OS pipes with stable positional
//!   ids, dead-slot reuse and a structural gate for `fork()`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sockpipe::{Error, Role, SocketKind, SocketTable};
//!
//! let mut table = SocketTable::new();
//! let server = table.acquire(SocketKind::Ipv4, "127.0.0.1", 9004, Role::Server)?;
//! let mut client = table.acquire(SocketKind::Ipv4, "127.0.0.1", 9004, Role::Client)?;
//!
//! if let Err(e) = table.send(client, b"marsh") {
//!     if let Some(fresh) = e.replacement() {
//!         client = fresh;
//!     }
//! }
//!
//! let mut buf = [0u8; 64];
//! match table.receive(server, &mut buf) {
//!     Ok(n) => println!("got {:?}", &buf[..n]),
//!     Err(e) if e.is_transient() => {} // try again next tick
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  Application: timing::Scheduler callbacks (1 thread)          |
//! +-------------------------------+-------------------------------+
//! |  SocketTable                  |  PipeManager                  |
//! |  [slot0][slot1][slot2]        |  [A0][D1][A2] ... (cap 5)     |
//! |  SocketRecord: fd + scratch   |  PipeChannel: read/write fd   |
//! +-------------------------------+-------------------------------+
//! |  socket2 / libc                                               |
//! +---------------------------------------------------------------+
//! ```
//!
//! Neither manager is thread-safe. Every descriptor defaults to
//! non-blocking mode; blocking is opt-in through [`config::IoMode`].

pub mod config;
pub mod error;
pub mod pipe;
pub mod socket;
pub mod stats;
pub mod timing;

pub use config::{IoMode, PipeConfig, SocketTableConfig, SockpipeConfig};
pub use error::{Error, Result};
pub use pipe::{FreezeGuard, PipeId, PipeManager, PipeSnapshot};
pub use socket::{ConnectionState, Endpoint, Role, SocketHandle, SocketKind, SocketTable};
pub use stats::{PipeStats, SocketTableStats};

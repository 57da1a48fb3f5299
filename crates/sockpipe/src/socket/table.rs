// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity socket handle table.
//!
//! # Example
//!
//! ```no_run
//! use sockpipe::{Error, Role, SocketKind, SocketTable};
//!
//! let mut table = SocketTable::new();
//! let mut client = table.acquire(SocketKind::Unix, "/tmp/my_socket", 0, Role::Client)?;
//!
//! match table.send(client, b"marsh") {
//!     Ok(n) => println!("sent {} bytes", n),
//!     Err(Error::ConnectFailed { replacement: Some(fresh), .. }) => client = fresh,
//!     Err(e) => eprintln!("send failed: {}", e),
//! }
//! # Ok::<(), Error>(())
//! ```

use super::record::SocketRecord;
use super::{ConnectionState, Endpoint, Role, SocketHandle, SocketKind};
use crate::config::SocketTableConfig;
use crate::error::{Error, Result};
use crate::stats::SocketTableStats;

#[derive(Default)]
struct Slot {
    generation: u64,
    record: Option<SocketRecord>,
}

/// Owns up to `capacity` socket records, addressed by [`SocketHandle`].
///
/// Not thread-safe; drive it from a single polling thread. Dropping the
/// table releases every live handle.
pub struct SocketTable {
    slots: Vec<Slot>,
    config: SocketTableConfig,
    stats: SocketTableStats,
}

impl Default for SocketTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTable {
    /// Table with the default configuration (3 slots, 256-byte scratch).
    pub fn new() -> Self {
        Self::build(SocketTableConfig::default())
    }

    /// Table with a caller-supplied configuration, validated first.
    pub fn with_config(config: SocketTableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SocketTableConfig) -> Self {
        let slots = (0..config.capacity).map(|_| Slot::default()).collect();
        Self {
            slots,
            config,
            stats: SocketTableStats::default(),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn config(&self) -> &SocketTableConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.record.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SocketTableStats {
        self.stats.clone()
    }

    /// Whether `handle` names a live record.
    pub fn contains(&self, handle: SocketHandle) -> bool {
        self.record(handle).is_ok()
    }

    pub fn kind(&self, handle: SocketHandle) -> Result<SocketKind> {
        self.record(handle).map(SocketRecord::kind)
    }

    pub fn role(&self, handle: SocketHandle) -> Result<Role> {
        self.record(handle).map(SocketRecord::role)
    }

    pub fn state(&self, handle: SocketHandle) -> Result<ConnectionState> {
        self.record(handle).map(SocketRecord::state)
    }

    /// Endpoint the handle was acquired for.
    pub fn endpoint(&self, handle: SocketHandle) -> Result<Endpoint> {
        self.record(handle).map(|r| r.endpoint().clone())
    }

    /// Address the OS actually bound (e.g. the port chosen for port 0).
    pub fn local_addr(&self, handle: SocketHandle) -> Result<Endpoint> {
        let record = self.record(handle)?;
        let addr = record.local_addr().map_err(Error::IoFailed)?;
        Endpoint::from_sock_addr(&addr)
            .ok_or_else(|| Error::InvalidAddress("unnamed local address".into()))
    }

    fn record(&self, handle: SocketHandle) -> Result<&SocketRecord> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.record.as_ref())
            .ok_or(Error::NotFound)
    }

    fn record_mut(&mut self, handle: SocketHandle) -> Result<&mut SocketRecord> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.record.as_mut())
            .ok_or(Error::NotFound)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a socket in the lowest free slot.
    ///
    /// `address` is an IP literal for inet kinds or a filesystem path for
    /// Unix-domain sockets (where `port` is ignored). Servers are bound and
    /// listening on return; a Unix-domain server creates its path, removed
    /// again on release.
    pub fn acquire(
        &mut self,
        kind: SocketKind,
        address: &str,
        port: u16,
        role: Role,
    ) -> Result<SocketHandle> {
        let endpoint = Endpoint::resolve(kind, address, port)?;

        let index = self
            .slots
            .iter()
            .position(|slot| slot.record.is_none())
            .ok_or(Error::TableFull {
                capacity: self.slots.len(),
            })?;

        let record = match SocketRecord::open(kind, role, endpoint, &self.config) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("[SOCK] acquire {} {} {} failed: {}", kind, role, address, e);
                return Err(e);
            }
        };

        let slot = &mut self.slots[index];
        slot.generation += 1;
        let handle = SocketHandle::new(index, slot.generation);
        log::debug!(
            "[SOCK] acquired {} ({} {} {})",
            handle,
            kind,
            role,
            record.endpoint()
        );
        slot.record = Some(record);
        self.stats.acquired += 1;
        Ok(handle)
    }

    /// Close the handle's descriptors and free its slot.
    ///
    /// Close and unlink failures are ignored. A free, stale or out-of-range
    /// handle is `NotFound`.
    pub fn release(&mut self, handle: SocketHandle) -> Result<()> {
        let record = self.take(handle)?;
        log::debug!("[SOCK] released {} ({})", handle, record.endpoint());
        drop(record);
        Ok(())
    }

    fn take(&mut self, handle: SocketHandle) -> Result<SocketRecord> {
        let record = self
            .slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.record.take())
            .ok_or(Error::NotFound)?;
        self.stats.released += 1;
        Ok(record)
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Send `buf` on the handle.
    ///
    /// Clients connect first when not connected (first send, or after the
    /// peer probe or a previous send found the peer gone). If that connect
    /// fails the handle is replaced (see [`Error::ConnectFailed`]) and
    /// nothing is sent this round. Servers send to their accepted peer.
    ///
    /// A full send buffer accepts zero bytes (`Ok(0)`) and keeps the
    /// connection; only hard errors are `SendFailed` and drop the peer.
    pub fn send(&mut self, handle: SocketHandle, buf: &[u8]) -> Result<usize> {
        let timeout = self.config.connect_timeout();
        let record = self.record_mut(handle)?;

        if record.role() == Role::Client {
            record.probe_peer()?;
            if !record.state().is_connected() {
                if let Err(source) = record.connect(timeout) {
                    return Err(self.reconnect(handle, source));
                }
            }
        }

        match self.record_mut(handle)?.send(buf) {
            Ok(n) => {
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                if matches!(e, Error::SendFailed(_)) {
                    self.stats.send_failures += 1;
                    log::debug!("[SOCK] send on {} failed: {}", handle, e);
                }
                Err(e)
            }
        }
    }

    /// Receive into `buf`, returning the number of bytes copied.
    ///
    /// `buf` is zero-filled first. A server without a peer accepts one first
    /// (`NoConnection` if none is pending); an unconnected client is
    /// `NoConnection`. No data is `NoData`. Both are retryable.
    pub fn receive(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        let record = self.record_mut(handle)?;

        match record.role() {
            Role::Server => {
                record.probe_peer()?;
                if !record.has_peer() {
                    record.accept()?;
                    self.stats.accepts += 1;
                }
            }
            Role::Client => {
                if !record.state().is_connected() {
                    return Err(Error::NoConnection);
                }
            }
        }

        let n = self.record_mut(handle)?.receive(buf)?;
        self.stats.bytes_received += n as u64;
        Ok(n)
    }

    /// Replace a client whose connect failed with a fresh record for the same
    /// endpoint, returning the error to hand back to the caller.
    fn reconnect(&mut self, handle: SocketHandle, source: std::io::Error) -> Error {
        let record = match self.take(handle) {
            Ok(record) => record,
            Err(e) => return e,
        };
        let kind = record.kind();
        let role = record.role();
        let (address, port) = record.endpoint().address_and_port();
        log::info!(
            "[SOCK] {} failed to connect to {}: {}",
            handle,
            record.endpoint(),
            source
        );
        drop(record);

        let replacement = match self.acquire(kind, &address, port, role) {
            Ok(fresh) => {
                log::info!("[SOCK] {} replaced by {}", handle, fresh);
                Some(fresh)
            }
            Err(e) => {
                log::warn!("[SOCK] could not re-acquire {} for {}: {}", kind, address, e);
                None
            }
        };
        self.stats.reconnects += 1;

        Error::ConnectFailed {
            retired: handle,
            replacement,
            source,
        }
    }
}

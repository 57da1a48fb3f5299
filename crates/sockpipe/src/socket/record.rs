// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One socket record: descriptors, endpoint, state and scratch buffer.
//!
//! For servers `socket` is the passive listening descriptor and `peer` the
//! accepted one; for clients `socket` both connects and transfers and `peer`
//! stays empty. Dropping a record closes its descriptors (close errors are
//! ignored) and removes the bound path of a Unix-domain server.

use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use socket2::{SockAddr, Socket, Type};

use super::{ConnectionState, Endpoint, Role, SocketKind};
use crate::config::{IoMode, SocketTableConfig};
use crate::error::{Error, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

pub(crate) struct SocketRecord {
    kind: SocketKind,
    role: Role,
    state: ConnectionState,
    endpoint: Endpoint,
    addr: SockAddr,
    socket: Socket,
    peer: Option<Socket>,
    scratch: Vec<u8>,
    io_mode: IoMode,
    /// Path this record bound and must unlink on drop
    bound_path: Option<PathBuf>,
}

impl SocketRecord {
    /// Create the OS socket; servers are also bound and listening on return.
    pub(crate) fn open(
        kind: SocketKind,
        role: Role,
        endpoint: Endpoint,
        config: &SocketTableConfig,
    ) -> Result<Self> {
        let addr = endpoint.sock_addr()?;
        let socket =
            Socket::new(endpoint.domain(), Type::STREAM, None).map_err(Error::ResourceExhausted)?;

        let mut record = Self {
            kind,
            role,
            state: match role {
                Role::Server => ConnectionState::Listening,
                Role::Client => ConnectionState::Unbound,
            },
            endpoint,
            addr,
            socket,
            peer: None,
            scratch: vec![0; config.scratch_size],
            io_mode: config.io_mode,
            bound_path: None,
        };

        if role == Role::Server {
            record.listen(config)?;
        }
        Ok(record)
    }

    fn listen(&mut self, config: &SocketTableConfig) -> Result<()> {
        self.socket
            .set_reuse_address(true)
            .map_err(Error::BindFailed)?;
        #[cfg(unix)]
        if self.kind.is_inet() {
            set_reuseport(&self.socket).map_err(Error::BindFailed)?;
        }

        if let Some(path) = self.endpoint.unix_path() {
            if config.unlink_stale {
                remove_stale_socket_file(path);
            }
        }

        self.socket.bind(&self.addr).map_err(Error::BindFailed)?;
        // From here on the path exists and belongs to this record.
        self.bound_path = self.endpoint.unix_path().map(|p| p.to_path_buf());

        self.socket
            .listen(config.listen_backlog)
            .map_err(Error::ListenFailed)?;
        self.socket
            .set_nonblocking(self.io_mode.is_nonblocking())
            .map_err(Error::ListenFailed)?;
        Ok(())
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub(crate) fn kind(&self) -> SocketKind {
        self.kind
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn local_addr(&self) -> io::Result<SockAddr> {
        self.socket.local_addr()
    }

    pub(crate) fn has_peer(&self) -> bool {
        self.peer.is_some()
    }

    // ========================================================================
    // Peer liveness
    // ========================================================================

    /// Best-effort stale-peer check via `SO_ERROR` on the transfer descriptor.
    ///
    /// Only run while the state claims "connected". A pending socket error
    /// demotes the record (client -> `Disconnected`, server drops its peer).
    /// A quiet peer is indistinguishable from a live one here.
    pub(crate) fn probe_peer(&mut self) -> Result<()> {
        if !self.state.is_connected() {
            return Ok(());
        }
        let transfer = match self.role {
            Role::Client => &self.socket,
            Role::Server => match &self.peer {
                Some(peer) => peer,
                None => return Ok(()),
            },
        };
        match transfer.take_error() {
            Ok(None) => Ok(()),
            Ok(Some(err)) => {
                log::debug!("[SOCK] {} peer error on {}: {}", self.role, self.endpoint, err);
                self.peer_lost();
                Ok(())
            }
            Err(e) => Err(Error::IoFailed(e)),
        }
    }

    fn peer_lost(&mut self) {
        match self.role {
            Role::Client => self.state = ConnectionState::Disconnected,
            Role::Server => {
                self.peer = None;
                self.state = ConnectionState::Listening;
            }
        }
    }

    // ========================================================================
    // Connection establishment
    // ========================================================================

    /// Connect a client to its endpoint (same record, no re-derivation).
    ///
    /// Runs in blocking mode (bounded by `timeout` when given), then applies
    /// the configured I/O mode for transfer.
    pub(crate) fn connect(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_nonblocking(false)?;
        match timeout {
            Some(t) => self.socket.connect_timeout(&self.addr, t)?,
            None => self.socket.connect(&self.addr)?,
        }
        self.socket.set_nonblocking(self.io_mode.is_nonblocking())?;
        self.state = ConnectionState::Connected;
        log::debug!("[SOCK] client connected to {}", self.endpoint);
        Ok(())
    }

    /// Accept one pending peer on a listening server.
    ///
    /// Nothing pending (or any accept failure) is `NoConnection`; the caller
    /// retries on a later tick.
    pub(crate) fn accept(&mut self) -> Result<()> {
        match self.socket.accept() {
            Ok((peer, peer_addr)) => {
                if let Err(e) = peer.set_nonblocking(self.io_mode.is_nonblocking()) {
                    log::warn!("[SOCK] failed to set mode on accepted peer: {}", e);
                    return Err(Error::NoConnection);
                }
                log::debug!(
                    "[SOCK] server {} accepted peer {:?}",
                    self.endpoint,
                    Endpoint::from_sock_addr(&peer_addr)
                );
                self.peer = Some(peer);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::WouldBlock {
                    log::debug!("[SOCK] accept on {} failed: {}", self.endpoint, e);
                }
                Err(Error::NoConnection)
            }
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Raw send on the transfer descriptor.
    ///
    /// A full send buffer (or an interrupted call) accepts zero bytes and
    /// leaves the connection alone; any other error drops the peer.
    pub(crate) fn send(&mut self, buf: &[u8]) -> Result<usize> {
        let transfer = match self.role {
            Role::Client => &self.socket,
            Role::Server => self.peer.as_ref().ok_or(Error::NoConnection)?,
        };
        match transfer.send_with_flags(buf, SEND_FLAGS) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => {
                self.peer_lost();
                Err(Error::SendFailed(e))
            }
        }
    }

    /// Raw receive into the scratch buffer, then copy
    /// `min(received, buf.len())` bytes into `buf`.
    ///
    /// Zero bytes, "would block" and receive errors are all `NoData`; an
    /// orderly close or a hard error also drops the peer.
    pub(crate) fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = {
            let mut transfer = match self.role {
                Role::Client => &self.socket,
                Role::Server => self.peer.as_ref().ok_or(Error::NoConnection)?,
            };
            transfer.read(&mut self.scratch)
        };

        match result {
            Ok(0) => {
                log::debug!("[SOCK] peer of {} closed", self.endpoint);
                self.peer_lost();
                Err(Error::NoData)
            }
            Ok(received) => {
                let n = received.min(buf.len());
                buf[..n].copy_from_slice(&self.scratch[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(Error::NoData),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(Error::NoData),
            Err(e) => {
                log::debug!("[SOCK] receive on {} failed: {}", self.endpoint, e);
                self.peer_lost();
                Err(Error::NoData)
            }
        }
    }
}

impl Drop for SocketRecord {
    fn drop(&mut self) {
        // Descriptors close when `socket`/`peer` drop; only the path needs care.
        if let Some(path) = self.bound_path.take() {
            // May race with a peer unlinking it first.
            if let Err(e) = std::fs::remove_file(&path) {
                log::debug!("[SOCK] unlink {} ignored: {}", path.display(), e);
            }
        }
    }
}

/// Remove a leftover socket file from a previous run. Regular files are left
/// alone so a mistyped path cannot delete data; bind then fails instead.
fn remove_stale_socket_file(path: &std::path::Path) {
    use std::os::unix::fs::FileTypeExt;

    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.file_type().is_socket() && std::fs::remove_file(path).is_ok() {
            log::debug!("[SOCK] removed stale socket file {}", path.display());
        }
    }
}

#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SocketTableConfig {
        SocketTableConfig::default().with_scratch_size(8)
    }

    fn unix_endpoint(dir: &tempfile::TempDir, name: &str) -> Endpoint {
        Endpoint::Unix(dir.path().join(name))
    }

    #[test]
    fn test_server_binds_and_unlinks_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let ep = unix_endpoint(&dir, "srv.sock");
        let path = ep.unix_path().unwrap().to_path_buf();

        let record = SocketRecord::open(SocketKind::Unix, Role::Server, ep, &config()).unwrap();
        assert_eq!(record.state(), ConnectionState::Listening);
        assert!(path.exists());

        drop(record);
        assert!(!path.exists());
    }

    #[test]
    fn test_client_starts_unbound_and_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let ep = unix_endpoint(&dir, "nobody.sock");
        let path = ep.unix_path().unwrap().to_path_buf();

        let mut record =
            SocketRecord::open(SocketKind::Unix, Role::Client, ep, &config()).unwrap();
        assert_eq!(record.state(), ConnectionState::Unbound);
        assert!(record.connect(None).is_err());
        assert_eq!(record.state(), ConnectionState::Unbound);

        drop(record);
        assert!(!path.exists());
    }

    #[test]
    fn test_receive_truncates_to_scratch_and_caller() {
        let dir = tempfile::tempdir().unwrap();
        let ep = unix_endpoint(&dir, "trunc.sock");

        let mut server =
            SocketRecord::open(SocketKind::Unix, Role::Server, ep.clone(), &config()).unwrap();
        let mut client = SocketRecord::open(SocketKind::Unix, Role::Client, ep, &config()).unwrap();
        client.connect(None).unwrap();
        assert_eq!(client.send(b"0123456789abcdef").unwrap(), 16);

        server.accept().unwrap();
        assert!(server.has_peer());

        // Scratch holds 8 bytes; the caller asked for 5.
        let mut buf = [0u8; 5];
        assert_eq!(server.receive(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"01234");
    }

    #[test]
    fn test_server_send_without_peer() {
        let dir = tempfile::tempdir().unwrap();
        let ep = unix_endpoint(&dir, "nopeer.sock");
        let mut server = SocketRecord::open(SocketKind::Unix, Role::Server, ep, &config()).unwrap();
        assert!(matches!(server.send(b"x"), Err(Error::NoConnection)));
        assert!(matches!(server.accept(), Err(Error::NoConnection)));
    }

    #[test]
    fn test_peer_close_drops_peer() {
        let dir = tempfile::tempdir().unwrap();
        let ep = unix_endpoint(&dir, "close.sock");

        let mut server =
            SocketRecord::open(SocketKind::Unix, Role::Server, ep.clone(), &config()).unwrap();
        let mut client = SocketRecord::open(SocketKind::Unix, Role::Client, ep, &config()).unwrap();
        client.connect(None).unwrap();
        server.accept().unwrap();
        drop(client);

        let mut buf = [0u8; 4];
        assert!(matches!(server.receive(&mut buf), Err(Error::NoData)));
        assert!(!server.has_peer());
        assert_eq!(server.state(), ConnectionState::Listening);
    }

    fn loopback_port(record: &SocketRecord) -> u16 {
        record
            .local_addr()
            .unwrap()
            .as_socket()
            .map(|addr| addr.port())
            .unwrap()
    }

    /// Close `stream` with an RST instead of a FIN.
    fn reset(stream: std::net::TcpStream) {
        socket2::SockRef::from(&stream)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(stream);
        std::thread::sleep(Duration::from_millis(50));
    }

    fn ipv4(port: u16) -> Endpoint {
        Endpoint::Inet(std::net::SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn test_reset_peer_demotes_client() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client =
            SocketRecord::open(SocketKind::Ipv4, Role::Client, ipv4(port), &config()).unwrap();
        client.connect(None).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        client.probe_peer().unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);

        reset(accepted);
        client.probe_peer().unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // The descriptor cannot be reused; the table replaces the record.
        assert!(client.connect(None).is_err());
    }

    #[test]
    fn test_reset_peer_dropped_by_server_check() {
        let mut server = SocketRecord::open(SocketKind::Ipv4, Role::Server, ipv4(0), &config())
            .unwrap();
        let port = loopback_port(&server);

        let stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        for _ in 0..100 {
            if server.accept().is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(server.has_peer());

        reset(stream);
        server.probe_peer().unwrap();
        assert!(!server.has_peer());
        assert_eq!(server.state(), ConnectionState::Listening);
    }
}

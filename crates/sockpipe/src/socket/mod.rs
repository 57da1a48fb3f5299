// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket handle table for stream sockets (Unix-domain, TCP/IPv4, TCP/IPv6).
//!
//! A fixed number of slots each hold at most one socket record. Callers get a
//! [`SocketHandle`] back from `acquire` and drive the socket through `send`,
//! `receive` and `release`. Servers and clients share one API: a server is
//! bound and listening from the moment it is acquired and accepts its peer
//! lazily on `receive`; a client connects lazily on `send`.
//!
//! # Client State Machine
//!
//! ```text
//!      +----------+
//!      | Unbound  |--(connect fails)--> record destroyed,
//!      +----+-----+                     fresh Unbound record under a new handle
//!           | connect succeeds
//!           v
//!      +----------+
//!      |Connected |--(probe/send error)--+
//!      +----------+                      |
//!           ^                            v
//!           |                     +--------------+
//!           +----(reconnect ok)---| Disconnected |--(connect fails)--> new handle
//!                                 +--------------+
//! ```
//!
//! # Server States
//!
//! `Listening` until a peer is accepted, then `Connected` until the peer
//! closes, resets or a send to it fails; the next `receive` accepts again.
//!
//! # Reconnect
//!
//! A failed client connect never leaves a half-usable record behind: the
//! handle is released, its endpoint re-derived and a fresh handle acquired.
//! `send` reports this as [`Error::ConnectFailed`](crate::Error::ConnectFailed)
//! carrying the replacement; the retired handle answers `NotFound` from then
//! on, even when the replacement re-occupies the same slot index.

mod endpoint;
mod record;
mod table;

pub use endpoint::Endpoint;
pub use table::SocketTable;

use std::fmt;
use std::str::FromStr;

/// Socket family requested by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Unix-domain stream socket addressed by a filesystem path
    Unix,
    /// TCP over IPv4
    Ipv4,
    /// TCP over IPv6
    Ipv6,
    /// Datagram socket (declared, not implemented)
    Udp,
}

impl SocketKind {
    /// Whether the kind is addressed by IP + port.
    pub fn is_inet(self) -> bool {
        matches!(self, SocketKind::Ipv4 | SocketKind::Ipv6)
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketKind::Unix => "unix",
            SocketKind::Ipv4 => "ipv4",
            SocketKind::Ipv6 => "ipv6",
            SocketKind::Udp => "udp",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SocketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unix" | "local" => Ok(SocketKind::Unix),
            "ipv4" | "ip4" | "tcp" => Ok(SocketKind::Ipv4),
            "ipv6" | "ip6" => Ok(SocketKind::Ipv6),
            "udp" => Ok(SocketKind::Udp),
            other => Err(format!("unknown socket kind: {}", other)),
        }
    }
}

/// Side of the connection, fixed at acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Binds, listens and accepts; never connects
    Server,
    /// Connects lazily on send
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// Connection state of a socket record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Client that has not connected yet
    Unbound,
    /// Server with no accepted peer
    Listening,
    /// Client whose peer failed; the next send re-attempts connect
    Disconnected,
    /// Client connected, or server with an accepted peer
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Unbound => "Unbound",
            ConnectionState::Listening => "Listening",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connected => "Connected",
        };
        write!(f, "{}", s)
    }
}

/// Identifies one live socket record.
///
/// `index` is the slot id (lowest free slot at acquisition). `generation`
/// distinguishes successive occupants of the same slot, so a handle retired
/// by `release` or a reconnect never aliases its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle {
    index: usize,
    generation: u64,
}

impl SocketHandle {
    pub(crate) fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    /// Slot id of this handle.
    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u64 {
        self.generation
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket {}.{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("unix".parse::<SocketKind>(), Ok(SocketKind::Unix));
        assert_eq!("IPv6".parse::<SocketKind>(), Ok(SocketKind::Ipv6));
        assert_eq!("tcp".parse::<SocketKind>(), Ok(SocketKind::Ipv4));
        assert!("sctp".parse::<SocketKind>().is_err());

        for kind in [
            SocketKind::Unix,
            SocketKind::Ipv4,
            SocketKind::Ipv6,
            SocketKind::Udp,
        ] {
            assert_eq!(kind.to_string().parse::<SocketKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_kind_is_inet() {
        assert!(SocketKind::Ipv4.is_inet());
        assert!(SocketKind::Ipv6.is_inet());
        assert!(!SocketKind::Unix.is_inet());
        assert!(!SocketKind::Udp.is_inet());
    }

    #[test]
    fn test_handle_identity() {
        let a = SocketHandle::new(1, 1);
        let b = SocketHandle::new(1, 2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "socket 1.1");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Listening.to_string(), "Listening");
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}

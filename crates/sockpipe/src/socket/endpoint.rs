// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint representation for each socket kind.
//!
//! The caller supplies text (IP literal or filesystem path) and a host-order
//! port; the endpoint keeps the parsed form. `address_and_port` turns it back
//! into the caller's representation when a failed client is re-acquired.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use socket2::{Domain, SockAddr};

use super::SocketKind;
use crate::error::{Error, Result};

/// Where a socket listens or connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix-domain socket path
    Unix(PathBuf),
    /// IP address + port
    Inet(SocketAddr),
}

impl Endpoint {
    /// Build the endpoint for `kind` from caller text.
    ///
    /// `port` is ignored for Unix-domain sockets.
    pub fn resolve(kind: SocketKind, address: &str, port: u16) -> Result<Self> {
        if address.is_empty() {
            return Err(Error::InvalidAddress(format!("empty address for {} socket", kind)));
        }

        match kind {
            SocketKind::Unix => Ok(Endpoint::Unix(PathBuf::from(address))),
            SocketKind::Ipv4 => address
                .parse::<Ipv4Addr>()
                .map(|ip| Endpoint::Inet(SocketAddr::new(IpAddr::V4(ip), port)))
                .map_err(|_| Error::InvalidAddress(format!("{} is not an IPv4 literal", address))),
            SocketKind::Ipv6 => address
                .parse::<Ipv6Addr>()
                .map(|ip| Endpoint::Inet(SocketAddr::new(IpAddr::V6(ip), port)))
                .map_err(|_| Error::InvalidAddress(format!("{} is not an IPv6 literal", address))),
            SocketKind::Udp => Err(Error::Unsupported(kind)),
        }
    }

    /// Protocol family for `socket(2)`.
    pub fn domain(&self) -> Domain {
        match self {
            Endpoint::Unix(_) => Domain::UNIX,
            Endpoint::Inet(addr) => Domain::for_address(*addr),
        }
    }

    /// OS address structure. Fails for Unix paths that do not fit `sun_path`.
    pub fn sock_addr(&self) -> Result<SockAddr> {
        match self {
            Endpoint::Unix(path) => SockAddr::unix(path).map_err(|e| {
                Error::InvalidAddress(format!("unix path {}: {}", path.display(), e))
            }),
            Endpoint::Inet(addr) => Ok(SockAddr::from(*addr)),
        }
    }

    /// Re-derive the caller's (address text, host-order port).
    pub fn address_and_port(&self) -> (String, u16) {
        match self {
            Endpoint::Unix(path) => (path.to_string_lossy().into_owned(), 0),
            Endpoint::Inet(addr) => (addr.ip().to_string(), addr.port()),
        }
    }

    /// Bound path for Unix-domain endpoints.
    pub fn unix_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Unix(path) => Some(path),
            Endpoint::Inet(_) => None,
        }
    }

    /// Convert an OS address back into an endpoint.
    pub(crate) fn from_sock_addr(addr: &SockAddr) -> Option<Self> {
        if let Some(inet) = addr.as_socket() {
            return Some(Endpoint::Inet(inet));
        }
        addr.as_pathname()
            .map(|path| Endpoint::Unix(path.to_path_buf()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Inet(addr) => write!(f, "{}", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ipv4() {
        let ep = Endpoint::resolve(SocketKind::Ipv4, "127.0.0.1", 9004).unwrap();
        assert_eq!(ep, Endpoint::Inet("127.0.0.1:9004".parse().unwrap()));
        assert_eq!(ep.domain(), Domain::IPV4);
        assert_eq!(ep.address_and_port(), ("127.0.0.1".to_string(), 9004));
    }

    #[test]
    fn test_resolve_ipv6() {
        let ep = Endpoint::resolve(SocketKind::Ipv6, "::1", 9006).unwrap();
        assert_eq!(ep.domain(), Domain::IPV6);
        assert_eq!(ep.to_string(), "[::1]:9006");
        assert_eq!(ep.address_and_port(), ("::1".to_string(), 9006));
    }

    #[test]
    fn test_resolve_family_mismatch() {
        assert!(matches!(
            Endpoint::resolve(SocketKind::Ipv4, "::1", 1),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            Endpoint::resolve(SocketKind::Ipv6, "10.0.0.1", 1),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            Endpoint::resolve(SocketKind::Ipv4, "localhost", 1),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_resolve_empty_and_udp() {
        assert!(matches!(
            Endpoint::resolve(SocketKind::Unix, "", 0),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            Endpoint::resolve(SocketKind::Udp, "127.0.0.1", 9005),
            Err(Error::Unsupported(SocketKind::Udp))
        ));
    }

    #[test]
    fn test_unix_endpoint() {
        let ep = Endpoint::resolve(SocketKind::Unix, "/tmp/my_socket", 1234).unwrap();
        assert_eq!(ep.domain(), Domain::UNIX);
        assert_eq!(ep.unix_path(), Some(Path::new("/tmp/my_socket")));
        assert_eq!(ep.address_and_port(), ("/tmp/my_socket".to_string(), 0));
        assert!(ep.sock_addr().is_ok());
    }

    #[test]
    fn test_unix_path_too_long() {
        let long = format!("/tmp/{}", "x".repeat(200));
        let ep = Endpoint::resolve(SocketKind::Unix, &long, 0).unwrap();
        assert!(matches!(ep.sock_addr(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_round_trip_through_sock_addr() {
        let ep = Endpoint::resolve(SocketKind::Ipv4, "10.1.2.3", 80).unwrap();
        let addr = ep.sock_addr().unwrap();
        assert_eq!(Endpoint::from_sock_addr(&addr), Some(ep));
    }
}

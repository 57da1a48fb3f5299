// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by the socket table and the pipe manager.
//!
//! Every OS-level failure is caught at the syscall and mapped to one variant
//! below. Nothing is retried inside the library: a transient error means
//! "call again on the next scheduler tick".

use std::io;

use crate::config::ConfigError;
use crate::socket::{SocketHandle, SocketKind};

/// Errors returned by [`SocketTable`](crate::SocketTable) and
/// [`PipeManager`](crate::PipeManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ========================================================================
    // Capacity / lookup
    // ========================================================================
    /// Every slot of the table is in use.
    #[error("table full: all {capacity} slots in use")]
    TableFull { capacity: usize },

    /// Handle or id does not name a live resource.
    #[error("handle not found")]
    NotFound,

    /// Structural gate is held; allocation and deallocation are suspended.
    #[error("pipe structure is locked")]
    Locked,

    /// Internal bookkeeping disagrees with the stored sequence.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    // ========================================================================
    // Setup
    // ========================================================================
    /// Manager configuration rejected by `validate()`.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Address text or Unix-domain path could not be turned into an endpoint.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Socket kind is declared but not implemented.
    #[error("unsupported socket kind: {0}")]
    Unsupported(SocketKind),

    /// The OS refused to create a socket or pipe.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[source] io::Error),

    /// Binding (or setting reuse options before binding) failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] io::Error),

    /// Marking the socket as passively listening failed.
    #[error("listen failed: {0}")]
    ListenFailed(#[source] io::Error),

    // ========================================================================
    // Transfer
    // ========================================================================
    /// Client connect failed. The failed handle has been released and a fresh
    /// one acquired for the same endpoint; the caller must adopt
    /// `replacement` and retry the send on a later tick.
    #[error("connect failed on {retired}: {source}")]
    ConnectFailed {
        retired: SocketHandle,
        replacement: Option<SocketHandle>,
        #[source]
        source: io::Error,
    },

    /// OS-level send returned an error.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// No peer is connected (server has nothing to accept yet, or client
    /// was never connected).
    #[error("no connection")]
    NoConnection,

    /// Receive produced no bytes (empty, would block, or peer closed).
    #[error("no data")]
    NoData,

    /// Raw read/write or socket-option probe failed.
    #[error("I/O failed: {0}")]
    IoFailed(#[source] io::Error),
}

impl Error {
    /// Outcomes the caller is expected to retry on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NoConnection | Error::NoData | Error::ConnectFailed { .. } | Error::Locked
        )
    }

    /// Replacement handle carried by a failed connect, if any.
    pub fn replacement(&self) -> Option<SocketHandle> {
        match self {
            Error::ConnectFailed { replacement, .. } => *replacement,
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

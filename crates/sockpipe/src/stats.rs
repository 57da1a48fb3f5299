// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-manager counters.
//!
//! The managers are single-threaded, so counters are plain `u64` fields
//! updated in place and copied out by `stats()`.

/// Socket handle table counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SocketTableStats {
    /// Handles handed out by `acquire` (including reconnect re-acquisitions)
    pub acquired: u64,

    /// Handles released
    pub released: u64,

    /// Client handles replaced after a failed connect
    pub reconnects: u64,

    /// Peers accepted by server handles
    pub accepts: u64,

    /// Bytes passed to the OS by successful sends
    pub bytes_sent: u64,

    /// Bytes copied into caller buffers by successful receives
    pub bytes_received: u64,

    /// Sends the OS rejected
    pub send_failures: u64,
}

impl SocketTableStats {
    /// Handles currently outstanding according to the counters.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Pipe channel manager counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Channels created (appended or revived)
    pub allocated: u64,

    /// Channels closed
    pub deallocated: u64,

    /// Allocations that revived a dead slot instead of appending
    pub dead_reused: u64,

    /// Bytes accepted by pipe writes
    pub bytes_written: u64,

    /// Bytes returned by pipe reads
    pub bytes_read: u64,
}

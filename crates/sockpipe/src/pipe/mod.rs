// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipe channel manager.
//!
//! Channels live in a bounded arena and are addressed by their position in
//! it. Positions never shift: deallocating an interior channel closes its
//! pipe and leaves a *dead* slot behind, which the next `allocate` revives
//! before anything is appended. Only the tail slot is physically removed.
//!
//! ```text
//!  allocate x3      deallocate(1)     allocate
//!  [A0][A1][A2]  -> [A0][D1][A2]  ->  [A0][A1'][A2]
//!                                          ^ dead slot reused, not appended as 3
//! ```
//!
//! # Structural gate
//!
//! `lock()` (or the RAII [`FreezeGuard`] from `freeze()`) suspends
//! allocation and deallocation while reads and writes keep working. Hold it
//! across a `fork()` so both processes keep the same id -> channel mapping;
//! a [`PipeSnapshot`] records that mapping with raw fds for the worker.

mod channel;
mod freeze;
mod manager;

pub use channel::PipeChannel;
pub use freeze::{ChannelState, FreezeGuard, PipeSnapshot};
pub use manager::PipeManager;

use std::fmt;

/// Position of a channel in the manager's sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(usize);

impl PipeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for PipeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe {}", self.0)
    }
}

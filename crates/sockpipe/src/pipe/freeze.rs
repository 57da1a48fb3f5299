// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frozen views of the pipe sequence.

use std::ops::{Deref, DerefMut};
use std::os::unix::io::RawFd;

use super::{PipeId, PipeManager};

/// Holds the structural gate until dropped.
pub struct FreezeGuard<'a> {
    manager: &'a mut PipeManager,
    was_locked: bool,
}

impl<'a> FreezeGuard<'a> {
    pub(super) fn new(manager: &'a mut PipeManager, was_locked: bool) -> Self {
        Self {
            manager,
            was_locked,
        }
    }
}

impl Deref for FreezeGuard<'_> {
    type Target = PipeManager;

    fn deref(&self) -> &PipeManager {
        self.manager
    }
}

impl DerefMut for FreezeGuard<'_> {
    fn deref_mut(&mut self) -> &mut PipeManager {
        self.manager
    }
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        if !self.was_locked {
            self.manager.unlock();
        }
    }
}

/// State of one id at snapshot time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Alive { read_fd: RawFd, write_fd: RawFd },
    Dead,
}

impl ChannelState {
    pub fn is_alive(self) -> bool {
        matches!(self, ChannelState::Alive { .. })
    }
}

/// Immutable copy of the id -> channel mapping.
///
/// The fds stay owned by the manager; the snapshot is only valid while the
/// structure is frozen (or in a forked child that inherited them).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeSnapshot {
    channels: Vec<ChannelState>,
}

impl PipeSnapshot {
    pub(super) fn new(channels: Vec<ChannelState>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, id: PipeId) -> Option<ChannelState> {
        self.channels.get(id.index()).copied()
    }

    pub fn live_ids(&self) -> Vec<PipeId> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_alive())
            .map(|(index, _)| PipeId::new(index))
            .collect()
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::freeze::{ChannelState, FreezeGuard, PipeSnapshot};
use super::{PipeChannel, PipeId};
use crate::config::PipeConfig;
use crate::error::{Error, Result};
use crate::stats::PipeStats;

enum PipeSlot {
    Alive(PipeChannel),
    Dead,
}

/// Bounded sequence of pipe channels with stable positional ids.
pub struct PipeManager {
    slots: Vec<PipeSlot>,
    /// Sequence length (live + dead), cross-checked against `slots`
    allocated: usize,
    /// Dead slots, cross-checked against `slots`
    dead: usize,
    locked: bool,
    config: PipeConfig,
    stats: PipeStats,
}

impl Default for PipeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeManager {
    pub fn new() -> Self {
        Self::build(PipeConfig::default())
    }

    /// Manager with a caller-supplied configuration, validated first.
    pub fn with_config(config: PipeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipeConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.capacity),
            allocated: 0,
            dead: 0,
            locked: false,
            config,
            stats: PipeStats::default(),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Length of the sequence, dead slots included.
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }

    pub fn dead_count(&self) -> usize {
        self.dead
    }

    pub fn live_count(&self) -> usize {
        self.allocated.saturating_sub(self.dead)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn stats(&self) -> PipeStats {
        self.stats.clone()
    }

    /// Whether `id` names a live channel.
    pub fn is_alive(&self, id: PipeId) -> bool {
        matches!(self.slots.get(id.index()), Some(PipeSlot::Alive(_)))
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Create a channel, reviving the first dead slot or else appending.
    pub fn allocate(&mut self) -> Result<PipeId> {
        if self.locked {
            return Err(Error::Locked);
        }
        self.check_counters()?;

        let dead_slot = self
            .slots
            .iter()
            .position(|slot| matches!(slot, PipeSlot::Dead));

        let index = match dead_slot {
            Some(index) => index,
            None if self.slots.len() < self.config.capacity => self.slots.len(),
            None => {
                return Err(Error::TableFull {
                    capacity: self.config.capacity,
                })
            }
        };

        let channel = PipeChannel::open().map_err(Error::ResourceExhausted)?;
        let id = PipeId::new(index);
        if dead_slot.is_some() {
            self.slots[index] = PipeSlot::Alive(channel);
            self.dead -= 1;
            self.stats.dead_reused += 1;
            log::debug!("[PIPE] revived dead {}", id);
        } else {
            self.slots.push(PipeSlot::Alive(channel));
            self.allocated += 1;
            log::debug!("[PIPE] appended {}", id);
        }
        self.stats.allocated += 1;
        Ok(id)
    }

    /// Close a channel.
    ///
    /// The tail slot is removed; any other slot turns dead so later ids keep
    /// their position. Trailing dead slots left behind stay in place.
    pub fn deallocate(&mut self, id: PipeId) -> Result<()> {
        if self.locked {
            return Err(Error::Locked);
        }
        self.check_counters()?;

        let index = id.index();
        if index >= self.allocated {
            return Err(Error::NotFound);
        }
        if matches!(self.slots[index], PipeSlot::Dead) {
            return Err(Error::NotFound);
        }

        if index + 1 == self.allocated {
            // Dropping the channel closes both ends.
            self.slots.pop();
            self.allocated -= 1;
            log::debug!("[PIPE] removed tail {}", id);
        } else {
            self.slots[index] = PipeSlot::Dead;
            self.dead += 1;
            log::debug!("[PIPE] marked {} dead", id);
        }
        self.stats.deallocated += 1;
        Ok(())
    }

    // ========================================================================
    // Transfer (not affected by the gate)
    // ========================================================================

    /// Write to the channel's write end. May write fewer bytes than offered,
    /// or zero when the pipe is full.
    pub fn write(&mut self, id: PipeId, buf: &[u8]) -> Result<usize> {
        let mode = self.config.io_mode;
        let n = self
            .channel_mut(id)?
            .write(buf, mode)
            .map_err(Error::IoFailed)?;
        self.stats.bytes_written += n as u64;
        Ok(n)
    }

    /// Read from the channel's read end. Zero means nothing was pending.
    pub fn read(&mut self, id: PipeId, buf: &mut [u8]) -> Result<usize> {
        let mode = self.config.io_mode;
        let n = self
            .channel_mut(id)?
            .read(buf, mode)
            .map_err(Error::IoFailed)?;
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    fn channel_mut(&mut self, id: PipeId) -> Result<&mut PipeChannel> {
        self.check_counters()?;
        match self.slots.get_mut(id.index()) {
            Some(PipeSlot::Alive(channel)) => Ok(channel),
            Some(PipeSlot::Dead) | None => Err(Error::NotFound),
        }
    }

    fn check_counters(&self) -> Result<()> {
        let dead = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, PipeSlot::Dead))
            .count();
        if self.slots.len() != self.allocated || dead != self.dead {
            return Err(Error::CorruptState(format!(
                "sequence holds {} slots ({} dead), counters say {} ({} dead)",
                self.slots.len(),
                dead,
                self.allocated,
                self.dead
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Structural gate
    // ========================================================================

    /// Suspend allocation and deallocation.
    pub fn lock(&mut self) {
        self.locked = true;
        log::debug!("[PIPE] structure locked");
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        log::debug!("[PIPE] structure unlocked");
    }

    /// Lock the structure for the guard's lifetime.
    ///
    /// The guard dereferences to the manager, so reads and writes go through
    /// it; dropping it unlocks. A manager that was already locked stays
    /// locked after the guard drops.
    pub fn freeze(&mut self) -> FreezeGuard<'_> {
        let was_locked = self.locked;
        self.lock();
        FreezeGuard::new(self, was_locked)
    }

    /// Per-id view of the sequence with the raw fds of live channels.
    pub fn snapshot(&self) -> PipeSnapshot {
        let channels = self
            .slots
            .iter()
            .map(|slot| match slot {
                PipeSlot::Alive(ch) => ChannelState::Alive {
                    read_fd: ch.read_fd(),
                    write_fd: ch.write_fd(),
                },
                PipeSlot::Dead => ChannelState::Dead,
            })
            .collect();
        PipeSnapshot::new(channels)
    }

    #[cfg(test)]
    fn corrupt_dead_counter(&mut self) {
        self.dead += 1;
    }
}

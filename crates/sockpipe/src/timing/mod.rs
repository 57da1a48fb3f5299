// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timing collaborators for the polling loop.
//!
//! - `stopwatch` - monotonic "has D ms elapsed since mark M" oracle
//! - `scheduler` - fixed-rate cooperative task runner
//!
//! The socket table and pipe manager never call into this module; an
//! application drives them from scheduler callbacks.

mod scheduler;
mod stopwatch;

pub use scheduler::{Scheduler, TaskId, DEFAULT_TICK};
pub use stopwatch::{delay_ms, Stopwatch};

/// Common scheduler intervals (milliseconds).
pub const INTERVAL_1_MS: u64 = 1;
pub const INTERVAL_10_MS: u64 = 10;
pub const INTERVAL_50_MS: u64 = 50;
pub const INTERVAL_500_MS: u64 = 500;
pub const INTERVAL_1000_MS: u64 = 1000;

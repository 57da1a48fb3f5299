// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monotonic elapsed-time oracle.

use std::time::{Duration, Instant};

/// Start mark plus "has at least D ms elapsed" queries.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    start: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a stopwatch marked at the current instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Reset the start mark to now.
    pub fn mark_start(&mut self) {
        self.start = Instant::now();
    }

    /// True once strictly more than `duration_ms` has passed since the mark.
    pub fn has_elapsed(&self, duration_ms: u64) -> bool {
        self.start.elapsed() > Duration::from_millis(duration_ms)
    }

    /// Milliseconds since the mark.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Raw elapsed time since the mark.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Block the calling thread for `ms` milliseconds.
pub fn delay_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_elapsed() {
        let mut watch = Stopwatch::new();
        assert!(!watch.has_elapsed(10_000));

        delay_ms(15);
        assert!(watch.has_elapsed(5));
        assert!(watch.elapsed_ms() >= 15);

        watch.mark_start();
        assert!(!watch.has_elapsed(10_000));
    }

    #[test]
    fn test_zero_duration() {
        let watch = Stopwatch::new();
        delay_ms(1);
        assert!(watch.has_elapsed(0));
    }
}

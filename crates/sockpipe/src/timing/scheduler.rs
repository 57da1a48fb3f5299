// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-rate cooperative scheduler.
//!
//! Tasks are closures over a caller-supplied context `C` (typically a struct
//! holding a [`SocketTable`](crate::SocketTable) and a
//! [`PipeManager`](crate::PipeManager)). Everything runs on the polling
//! thread; a task that blocks delays every other task.
//!
//! # Example
//!
//! ```
//! use sockpipe::timing::Scheduler;
//!
//! let mut ticks = 0u32;
//! let mut scheduler = Scheduler::new();
//! scheduler.register_periodic(0, |count: &mut u32| *count += 1);
//! scheduler.poll(&mut ticks);
//! assert_eq!(ticks, 1);
//! ```

use std::time::{Duration, Instant};

use super::Stopwatch;

/// Tick length used by [`Scheduler::run_for`].
pub const DEFAULT_TICK: Duration = Duration::from_millis(1);

/// Identifier of a registered task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

struct PeriodicTask<C> {
    interval_ms: u64,
    watch: Stopwatch,
    ran_once: bool,
    callback: Box<dyn FnMut(&mut C)>,
}

/// Runs registered callbacks every N milliseconds.
pub struct Scheduler<C = ()> {
    tasks: Vec<PeriodicTask<C>>,
    tick: Duration,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            tick: DEFAULT_TICK,
        }
    }

    /// Builder: set the sleep between polls in [`run_for`](Self::run_for).
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Register `callback` to run every `interval_ms`.
    ///
    /// A task is due on the first poll after registration, then whenever
    /// more than `interval_ms` has passed since its previous run.
    pub fn register_periodic<F>(&mut self, interval_ms: u64, callback: F) -> TaskId
    where
        F: FnMut(&mut C) + 'static,
    {
        self.tasks.push(PeriodicTask {
            interval_ms,
            watch: Stopwatch::new(),
            ran_once: false,
            callback: Box::new(callback),
        });
        TaskId(self.tasks.len() - 1)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every due task once. Returns how many ran.
    pub fn poll(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        for task in &mut self.tasks {
            if !task.ran_once || task.watch.has_elapsed(task.interval_ms) {
                (task.callback)(ctx);
                task.watch.mark_start();
                task.ran_once = true;
                ran += 1;
            }
        }
        ran
    }

    /// Poll repeatedly for `duration`, sleeping one tick between polls.
    /// Returns the total number of task runs.
    pub fn run_for(&mut self, ctx: &mut C, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        self.run_until(ctx, || Instant::now() >= deadline)
    }

    /// Poll until `stop` returns true, sleeping one tick between polls.
    pub fn run_until<F>(&mut self, ctx: &mut C, mut stop: F) -> usize
    where
        F: FnMut() -> bool,
    {
        let mut total = 0;
        while !stop() {
            total += self.poll(ctx);
            std::thread::sleep(self.tick);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_runs_everything() {
        let mut scheduler: Scheduler<Vec<&'static str>> = Scheduler::new();
        scheduler.register_periodic(10_000, |log| log.push("slow"));
        scheduler.register_periodic(0, |log| log.push("fast"));
        assert_eq!(scheduler.len(), 2);

        let mut log = Vec::new();
        assert_eq!(scheduler.poll(&mut log), 2);
        assert_eq!(log, vec!["slow", "fast"]);

        // Slow task is not due again yet.
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(scheduler.poll(&mut log), 1);
        assert_eq!(log.last(), Some(&"fast"));
    }

    #[test]
    fn test_run_for_counts_runs() {
        let mut count = 0u32;
        let mut scheduler = Scheduler::new().with_tick(Duration::from_millis(1));
        scheduler.register_periodic(5, |c: &mut u32| *c += 1);

        let runs = scheduler.run_for(&mut count, Duration::from_millis(40));
        assert_eq!(runs as u32, count);
        assert!(count >= 2, "expected several runs, got {}", count);
    }

    #[test]
    fn test_run_until_stops_immediately() {
        let mut scheduler: Scheduler = Scheduler::new();
        scheduler.register_periodic(0, |_| {});
        assert_eq!(scheduler.run_until(&mut (), || true), 0);
    }
}

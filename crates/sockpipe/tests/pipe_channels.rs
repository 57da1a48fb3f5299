// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic

//! Pipe manager scenarios through the public API.

use sockpipe::pipe::ChannelState;
use sockpipe::{Error, IoMode, PipeConfig, PipeId, PipeManager};

#[test]
fn test_dead_slot_reused_before_append() {
    let mut pipes = PipeManager::new();
    assert_eq!(pipes.allocate().unwrap(), PipeId::new(0));
    assert_eq!(pipes.allocate().unwrap(), PipeId::new(1));
    assert_eq!(pipes.allocate().unwrap(), PipeId::new(2));

    pipes.deallocate(PipeId::new(1)).unwrap();
    assert_eq!(pipes.allocate().unwrap(), PipeId::new(1));
    assert_eq!(pipes.allocate().unwrap(), PipeId::new(3));
}

#[test]
fn test_round_trip_each_channel() {
    let mut pipes = PipeManager::new();
    let ids: Vec<PipeId> = (0..pipes.capacity())
        .map(|_| pipes.allocate().unwrap())
        .collect();

    for id in &ids {
        let msg = format!("from {}", id);
        assert_eq!(pipes.write(*id, msg.as_bytes()).unwrap(), msg.len());
    }
    for id in &ids {
        let expected = format!("from {}", id);
        let mut buf = vec![0u8; expected.len()];
        assert_eq!(pipes.read(*id, &mut buf).unwrap(), expected.len());
        assert_eq!(buf, expected.as_bytes());
    }
}

#[test]
fn test_partial_read_leaves_rest() {
    let mut pipes = PipeManager::new();
    let id = pipes.allocate().unwrap();
    pipes.write(id, b"abcdef").unwrap();

    let mut head = [0u8; 2];
    assert_eq!(pipes.read(id, &mut head).unwrap(), 2);
    assert_eq!(&head, b"ab");

    let mut tail = [0u8; 16];
    assert_eq!(pipes.read(id, &mut tail).unwrap(), 4);
    assert_eq!(&tail[..4], b"cdef");
}

#[test]
fn test_full_pipe_write_returns_zero() {
    let mut pipes = PipeManager::new();
    let id = pipes.allocate().unwrap();

    let chunk = [7u8; 4096];
    let mut total = 0usize;
    loop {
        let n = pipes.write(id, &chunk).unwrap();
        if n == 0 {
            break;
        }
        total += n;
        assert!(total < 64 * 1024 * 1024, "pipe never filled");
    }
    assert!(total > 0);
}

#[test]
fn test_freeze_then_snapshot_for_worker() {
    let mut pipes = PipeManager::with_config(
        PipeConfig::default()
            .with_capacity(2)
            .with_io_mode(IoMode::NonBlocking),
    )
    .unwrap();
    let to_worker = pipes.allocate().unwrap();
    let from_worker = pipes.allocate().unwrap();

    let mut frozen = pipes.freeze();
    assert!(matches!(frozen.deallocate(to_worker), Err(Error::Locked)));

    let snapshot = frozen.snapshot();
    let write_fd = match snapshot.get(from_worker) {
        Some(ChannelState::Alive { write_fd, .. }) => write_fd,
        other => panic!("unexpected state {:?}", other),
    };

    // A worker holding the snapshot writes through the raw fd.
    let payload = b"1";
    // SAFETY: fd is owned by the frozen manager and open for the test's duration
    let written = unsafe { libc::write(write_fd, payload.as_ptr().cast(), payload.len()) };
    assert_eq!(written, 1);

    let mut buf = [0u8; 1];
    assert_eq!(frozen.read(from_worker, &mut buf).unwrap(), 1);
    assert_eq!(&buf, b"1");
    drop(frozen);

    assert!(!pipes.is_locked());
    pipes.deallocate(to_worker).unwrap();
    assert_eq!(pipes.dead_count(), 1);
}

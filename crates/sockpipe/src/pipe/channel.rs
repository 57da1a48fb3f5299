// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One OS pipe: a read end and a write end.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use crate::config::IoMode;

/// Both ends of an anonymous pipe. Dropping the channel closes them.
#[derive(Debug)]
pub struct PipeChannel {
    reader: File,
    writer: File,
}

impl PipeChannel {
    /// Create a fresh pipe via `pipe(2)`.
    pub fn open() -> io::Result<Self> {
        let mut fds: [libc::c_int; 2] = [-1, -1];
        // SAFETY: pipe() FFI with a valid pointer to two c_ints
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe() succeeded, so both fds are open and owned by nobody else
        let (reader, writer) = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
        Ok(Self { reader, writer })
    }

    pub fn read_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    pub fn write_fd(&self) -> RawFd {
        self.writer.as_raw_fd()
    }

    /// Write `buf` to the write end after applying `mode`.
    ///
    /// May accept fewer bytes than offered. In non-blocking mode a full pipe
    /// is `Ok(0)`.
    pub fn write(&mut self, buf: &[u8], mode: IoMode) -> io::Result<usize> {
        set_mode(self.writer.as_raw_fd(), mode)?;
        match self.writer.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            other => other,
        }
    }

    /// Read up to `buf.len()` bytes after applying `mode`.
    ///
    /// In non-blocking mode an empty pipe is `Ok(0)`.
    pub fn read(&mut self, buf: &mut [u8], mode: IoMode) -> io::Result<usize> {
        set_mode(self.reader.as_raw_fd(), mode)?;
        let mut staging = vec![0u8; buf.len()];
        let n = match self.reader.read(&mut staging) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            other => other?,
        };
        buf[..n].copy_from_slice(&staging[..n]);
        Ok(n)
    }
}

fn set_mode(fd: RawFd, mode: IoMode) -> io::Result<()> {
    // SAFETY: fcntl FFI on an fd owned by the calling channel
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let wanted = if mode.is_nonblocking() {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if wanted != flags {
        // SAFETY: same fd, flags derived from F_GETFL
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, wanted) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut ch = PipeChannel::open().unwrap();
        assert_ne!(ch.read_fd(), ch.write_fd());

        assert_eq!(ch.write(b"hello", IoMode::NonBlocking).unwrap(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(ch.read(&mut buf, IoMode::NonBlocking).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        let mut rest = [0u8; 8];
        assert_eq!(ch.read(&mut rest, IoMode::NonBlocking).unwrap(), 2);
        assert_eq!(&rest[..2], b"lo");
    }

    #[test]
    fn test_empty_nonblocking_read_is_zero() {
        let mut ch = PipeChannel::open().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(ch.read(&mut buf, IoMode::NonBlocking).unwrap(), 0);
    }

    #[test]
    fn test_mode_is_applied() {
        let ch = PipeChannel::open().unwrap();
        set_mode(ch.read_fd(), IoMode::NonBlocking).unwrap();
        // SAFETY: fd owned by `ch`
        let flags = unsafe { libc::fcntl(ch.read_fd(), libc::F_GETFL) };
        assert_ne!(flags & libc::O_NONBLOCK, 0);

        set_mode(ch.read_fd(), IoMode::Blocking).unwrap();
        // SAFETY: fd owned by `ch`
        let flags = unsafe { libc::fcntl(ch.read_fd(), libc::F_GETFL) };
        assert_eq!(flags & libc::O_NONBLOCK, 0);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration for the socket table and pipe manager.
//!
//! Supports programmatic construction, TOML files and environment overrides.
//!
//! # Example
//!
//! ```
//! use sockpipe::config::{IoMode, SockpipeConfig};
//!
//! let config: SockpipeConfig = toml::from_str(
//!     r#"
//!     [sockets]
//!     capacity = 8
//!     io_mode = "blocking"
//!
//!     [pipes]
//!     capacity = 4
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.sockets.capacity, 8);
//! assert_eq!(config.sockets.io_mode, IoMode::Blocking);
//! assert_eq!(config.pipes.capacity, 4);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default socket table size.
pub const DEFAULT_SOCKET_CAPACITY: usize = 3;

/// Default pipe sequence size.
pub const DEFAULT_PIPE_CAPACITY: usize = 5;

/// Default intermediate receive buffer size (bytes).
pub const DEFAULT_SCRATCH_SIZE: usize = 256;

/// Default pending-connection queue length for servers.
pub const DEFAULT_LISTEN_BACKLOG: i32 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Blocking behaviour of a descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    /// Calls may suspend the thread (accept/recv/send wait for the peer).
    Blocking,
    /// Calls return immediately; "would block" surfaces as a transient outcome.
    #[default]
    NonBlocking,
}

impl IoMode {
    pub fn is_nonblocking(self) -> bool {
        self == IoMode::NonBlocking
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SockpipeConfig {
    #[serde(default)]
    pub sockets: SocketTableConfig,

    #[serde(default)]
    pub pipes: PipeConfig,
}

impl SockpipeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `SOCKPIPE_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `SOCKPIPE_*` environment overrides in place.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_usize("SOCKPIPE_SOCKET_CAPACITY") {
            self.sockets.capacity = v;
        }
        if let Some(v) = env_usize("SOCKPIPE_SCRATCH_SIZE") {
            self.sockets.scratch_size = v;
        }
        if let Some(v) = env_usize("SOCKPIPE_PIPE_CAPACITY") {
            self.pipes.capacity = v;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sockets.validate()?;
        self.pipes.validate()
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

/// Socket handle table configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketTableConfig {
    /// Maximum number of live handles.
    pub capacity: usize,

    /// Intermediate receive buffer size; receives truncate to this.
    pub scratch_size: usize,

    /// Server pending-connection queue length.
    pub listen_backlog: i32,

    /// Blocking mode for listening, accepted and connected sockets.
    pub io_mode: IoMode,

    /// Bound on a client connect attempt (milliseconds, None = OS default).
    pub connect_timeout_ms: Option<u64>,

    /// Remove a leftover Unix-domain socket file before a server binds.
    pub unlink_stale: bool,
}

impl Default for SocketTableConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SOCKET_CAPACITY,
            scratch_size: DEFAULT_SCRATCH_SIZE,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            io_mode: IoMode::NonBlocking,
            connect_timeout_ms: None,
            unlink_stale: true,
        }
    }
}

impl SocketTableConfig {
    /// Builder: set capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder: set scratch buffer size
    pub fn with_scratch_size(mut self, size: usize) -> Self {
        self.scratch_size = size;
        self
    }

    /// Builder: set I/O mode
    pub fn with_io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = mode;
        self
    }

    /// Builder: set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("socket capacity must be > 0".into()));
        }
        if self.scratch_size == 0 {
            return Err(ConfigError::Invalid("scratch_size must be > 0".into()));
        }
        if self.listen_backlog <= 0 {
            return Err(ConfigError::Invalid(format!(
                "listen_backlog must be > 0 (got {})",
                self.listen_backlog
            )));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be > 0 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Pipe channel manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Maximum length of the channel sequence (live + dead).
    pub capacity: usize,

    /// Mode applied to a pipe end before every read/write.
    pub io_mode: IoMode,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PIPE_CAPACITY,
            io_mode: IoMode::NonBlocking,
        }
    }
}

impl PipeConfig {
    /// Builder: set capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder: set I/O mode
    pub fn with_io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("pipe capacity must be > 0".into()));
        }
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! sockpipe echo demo
//!
//! A polling server and client built on socket handles, plus an optional
//! forked worker talking to the server over pipe channels.
//!
//! # Usage
//!
//! ```bash
//! # Unix-domain server with a counter worker
//! sockpipe-echo server --kind unix --address /tmp/my_socket --worker
//!
//! # Client sending every 500 ms
//! sockpipe-echo client --kind unix --address /tmp/my_socket --message marsh
//!
//! # TCP over IPv6
//! sockpipe-echo server --kind ipv6 --address ::1 --port 9006
//! sockpipe-echo client --kind ipv6 --address ::1 --port 9006
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sockpipe::timing::{delay_ms, Scheduler, INTERVAL_1000_MS};
use sockpipe::{
    Error, PipeId, PipeManager, Role, SocketHandle, SocketKind, SocketTable, SockpipeConfig,
};
use tracing_subscriber::EnvFilter;

/// sockpipe echo server/client
#[derive(Parser, Debug)]
#[command(name = "sockpipe-echo")]
#[command(about = "Echo demo for sockpipe socket handles and pipe channels")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen and log every message received
    Server {
        /// Socket kind (unix, ipv4, ipv6)
        #[arg(long, default_value = "unix")]
        kind: SocketKind,

        /// Socket path (unix) or IP literal
        #[arg(long, default_value = "/tmp/my_socket")]
        address: String,

        /// Port (ignored for unix)
        #[arg(long, default_value = "9004")]
        port: u16,

        /// Fork a worker that reports a counter over a pipe
        #[arg(long)]
        worker: bool,
    },

    /// Send a message periodically, reconnecting as needed
    Client {
        /// Socket kind (unix, ipv4, ipv6)
        #[arg(long, default_value = "unix")]
        kind: SocketKind,

        /// Socket path (unix) or IP literal
        #[arg(long, default_value = "/tmp/my_socket")]
        address: String,

        /// Port (ignored for unix)
        #[arg(long, default_value = "9004")]
        port: u16,

        /// Payload to send
        #[arg(long, default_value = "marsh")]
        message: String,

        /// Send interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(args.config.as_ref())?;

    match args.command {
        Commands::Server {
            kind,
            address,
            port,
            worker,
        } => run_server(config, kind, &address, port, worker),
        Commands::Client {
            kind,
            address,
            port,
            message,
            interval_ms,
        } => run_client(config, kind, &address, port, message, interval_ms),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SockpipeConfig> {
    let config = match path {
        Some(path) => {
            let mut config = SockpipeConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            config.apply_env();
            config
        }
        None => SockpipeConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        handler_stop.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }
    stop
}

// ============================================================================
// Server
// ============================================================================

struct ServerCtx {
    table: SocketTable,
    server: SocketHandle,
    buf: Vec<u8>,
    pipes: PipeManager,
    from_worker: Option<PipeId>,
}

fn run_server(
    config: SockpipeConfig,
    kind: SocketKind,
    address: &str,
    port: u16,
    with_worker: bool,
) -> Result<()> {
    let scratch = config.sockets.scratch_size;
    let mut table = SocketTable::with_config(config.sockets)?;
    let server = table.acquire(kind, address, port, Role::Server)?;
    tracing::info!(
        "listening on {} ({})",
        table.local_addr(server)?,
        server
    );

    let mut pipes = PipeManager::with_config(config.pipes)?;
    let worker = if with_worker {
        Some(spawn_worker(&mut pipes)?)
    } else {
        None
    };

    // Fork before ctrlc starts its handler thread.
    let stop = stop_flag();

    let mut ctx = ServerCtx {
        table,
        server,
        buf: vec![0; scratch],
        pipes,
        from_worker: worker.map(|(_, id)| id),
    };

    let mut scheduler = Scheduler::new();
    scheduler.register_periodic(INTERVAL_1000_MS, server_tick);
    if ctx.from_worker.is_some() {
        scheduler.register_periodic(INTERVAL_1000_MS, worker_tick);
    }
    scheduler.run_until(&mut ctx, || stop.load(Ordering::SeqCst));

    if let Some((pid, _)) = worker {
        reap_worker(pid);
    }
    let stats = ctx.table.stats();
    tracing::info!(
        "accepted {} peers, received {} bytes",
        stats.accepts,
        stats.bytes_received
    );
    ctx.table.release(ctx.server)?;
    Ok(())
}

fn server_tick(ctx: &mut ServerCtx) {
    match ctx.table.receive(ctx.server, &mut ctx.buf) {
        Ok(n) => tracing::info!("received: {}", String::from_utf8_lossy(&ctx.buf[..n])),
        Err(e) if e.is_transient() => tracing::debug!("receive: {}", e),
        Err(e) => tracing::warn!("receive failed: {}", e),
    }
}

fn worker_tick(ctx: &mut ServerCtx) {
    let Some(id) = ctx.from_worker else {
        return;
    };
    let mut counter = [0u8; 8];
    match ctx.pipes.read(id, &mut counter) {
        Ok(8) => tracing::info!("worker counter: {}", u64::from_le_bytes(counter)),
        Ok(0) => {}
        Ok(n) => tracing::warn!("short counter read ({} bytes)", n),
        Err(e) => tracing::warn!("worker pipe read failed: {}", e),
    }
}

/// Allocate the pipe pair and fork the counter worker with the structure
/// frozen. Returns the child pid and the channel it writes to.
fn spawn_worker(pipes: &mut PipeManager) -> Result<(libc::pid_t, PipeId)> {
    let _to_worker = pipes.allocate()?;
    let from_worker = pipes.allocate()?;

    let mut frozen = pipes.freeze();
    tracing::debug!("forking worker with {:?}", frozen.snapshot());

    // SAFETY: single-threaded at this point; the child only touches its own
    // copy of the pipe manager and exits without returning.
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => bail!("fork failed: {}", std::io::Error::last_os_error()),
        0 => worker_loop(&mut frozen, from_worker),
        pid => {
            tracing::info!("worker {} started", pid);
            Ok((pid, from_worker))
        }
    }
}

fn worker_loop(pipes: &mut PipeManager, out: PipeId) -> ! {
    // SAFETY: getppid has no preconditions
    let parent = unsafe { libc::getppid() };
    let mut counter: u64 = 0;

    // SAFETY: as above
    while unsafe { libc::getppid() } == parent {
        counter += 1;
        if let Err(e) = pipes.write(out, &counter.to_le_bytes()) {
            tracing::warn!("worker write failed: {}", e);
            break;
        }
        delay_ms(INTERVAL_1000_MS);
    }
    std::process::exit(0)
}

fn reap_worker(pid: libc::pid_t) {
    let mut status: libc::c_int = 0;
    // SAFETY: pid is our own child; status points to a valid c_int
    unsafe {
        libc::kill(pid, libc::SIGTERM);
        libc::waitpid(pid, &mut status, 0);
    }
    tracing::info!("worker {} stopped", pid);
}

// ============================================================================
// Client
// ============================================================================

struct ClientCtx {
    table: SocketTable,
    handle: Option<SocketHandle>,
    kind: SocketKind,
    address: String,
    port: u16,
    message: Vec<u8>,
}

fn run_client(
    config: SockpipeConfig,
    kind: SocketKind,
    address: &str,
    port: u16,
    message: String,
    interval_ms: u64,
) -> Result<()> {
    let mut table = SocketTable::with_config(config.sockets)?;
    let handle = table.acquire(kind, address, port, Role::Client)?;
    let stop = stop_flag();

    let mut ctx = ClientCtx {
        table,
        handle: Some(handle),
        kind,
        address: address.to_string(),
        port,
        message: message.into_bytes(),
    };

    let mut scheduler = Scheduler::new();
    scheduler.register_periodic(interval_ms, client_tick);
    scheduler.run_until(&mut ctx, || stop.load(Ordering::SeqCst));

    let stats = ctx.table.stats();
    tracing::info!(
        "sent {} bytes, {} reconnects",
        stats.bytes_sent,
        stats.reconnects
    );
    if let Some(handle) = ctx.handle {
        ctx.table.release(handle)?;
    }
    Ok(())
}

fn client_tick(ctx: &mut ClientCtx) {
    let handle = match ctx.handle {
        Some(handle) => handle,
        None => match ctx
            .table
            .acquire(ctx.kind, &ctx.address, ctx.port, Role::Client)
        {
            Ok(handle) => {
                ctx.handle = Some(handle);
                handle
            }
            Err(e) => {
                tracing::warn!("acquire failed: {}", e);
                return;
            }
        },
    };

    match ctx.table.send(handle, &ctx.message) {
        Ok(n) => tracing::info!("sent {} bytes", n),
        Err(Error::ConnectFailed {
            replacement,
            source,
            ..
        }) => {
            tracing::info!("server not reachable ({}), retrying", source);
            ctx.handle = replacement;
        }
        Err(e) => tracing::warn!("send failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_defaults() {
        let args = Args::try_parse_from(["sockpipe-echo", "server"]).unwrap();
        match args.command {
            Commands::Server {
                kind,
                address,
                port,
                worker,
            } => {
                assert_eq!(kind, SocketKind::Unix);
                assert_eq!(address, "/tmp/my_socket");
                assert_eq!(port, 9004);
                assert!(!worker);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_client() {
        let args = Args::try_parse_from([
            "sockpipe-echo",
            "client",
            "--kind",
            "ipv6",
            "--address",
            "::1",
            "--port",
            "9006",
            "--interval-ms",
            "250",
        ])
        .unwrap();
        match args.command {
            Commands::Client {
                kind,
                port,
                message,
                interval_ms,
                ..
            } => {
                assert_eq!(kind, SocketKind::Ipv6);
                assert_eq!(port, 9006);
                assert_eq!(message, "marsh");
                assert_eq!(interval_ms, 250);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(Args::try_parse_from(["sockpipe-echo", "server", "--kind", "sctp"]).is_err());
    }
}

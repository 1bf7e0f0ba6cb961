// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argo Daemon (argod)
//!
//! Long-running service that launches, supervises, and tears down
//! workflow scripts on behalf of HTTP API clients.
//!
//! Architecture:
//! - Listener task: accepts connections, one task per request
//! - Reaper task: the only waitpid caller, feeds the exit queue
//! - Scheduler worker: periodic timeout/rotation/completion/flush tasks

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod env;
mod http;
mod listener;
mod templates;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argo_core::{ExitQueue, SystemClock};
use argo_engine::tasks::{
    CompletionTask, FlushTask, LogRotateTask, TimeoutTask, FLUSH_INTERVAL, ROTATE_INTERVAL,
};
use argo_engine::{spawn_reaper, Scheduler, Supervisor};
use argo_storage::{Checkpoint, Registry};
use fs2::FileExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::listener::{ApiContext, Listener};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    let port_arg = match std::env::args().nth(1) {
        Some(arg) => match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("argod {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("argod {}", env!("CARGO_PKG_VERSION"));
                println!("Argo Daemon - supervises workflow scripts for the arc CLI");
                println!();
                println!("USAGE:");
                println!("    argod [port]");
                println!();
                println!("The daemon listens on 127.0.0.1:9876 unless a port argument");
                println!("or ARGO_DAEMON_PORT is given. State lives under ~/.argo");
                println!("(override with ARGO_STATE_DIR).");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => Some(arg),
        },
        None => None,
    };

    let config = Config::load(port_arg.as_deref())?;
    std::fs::create_dir_all(&config.state_dir)?;

    // Rotate our own log if it has grown too large
    rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup, so operators can
    // find where the current attempt begins)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting argo daemon");

    // One daemon per state dir
    let lock_file = match acquire_lock(&config) {
        Ok(file) => file,
        Err(LockError::Held(holder_pid)) => {
            eprintln!("argod is already running");
            if let Some(pid) = holder_pid {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(LockError::Io(e)) => {
            write_startup_error(&config, &e);
            error!("Failed to acquire daemon lock: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Registry: restore the checkpoint, then sweep records whose pids are
    // gone (after a restart that is all of them; they are surfaced once
    // in the log and purged).
    let registry = Arc::new(Mutex::new(load_registry(&config)));

    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&registry),
        config.logs_dir.clone(),
    ));
    let exit_queue = Arc::new(ExitQueue::new());

    // The reaper is the only waitpid caller in the process
    let reaper = match spawn_reaper(Arc::clone(&exit_queue)) {
        Ok(handle) => handle,
        Err(e) => {
            write_startup_error(&config, &e);
            error!("Failed to install SIGCHLD handler: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Background housekeeping
    let scheduler = Scheduler::new(SystemClock);
    {
        let task = TimeoutTask::new(Arc::clone(&registry));
        scheduler.register("workflow-timeout", config.timeout_interval, move || {
            task.run()
        })?;
    }
    {
        let task = CompletionTask::new(Arc::clone(&supervisor), Arc::clone(&exit_queue))
            .with_retry_base(config.retry_base_secs);
        scheduler.register("workflow-completion", config.completion_interval, move || {
            task.run()
        })?;
    }
    {
        let task = LogRotateTask::new(config.logs_dir.clone());
        scheduler.register("log-rotation", ROTATE_INTERVAL, move || task.run())?;
    }
    {
        let task = FlushTask::new(Arc::clone(&registry), config.registry_path.clone());
        scheduler.register("registry-flush", FLUSH_INTERVAL, move || task.run())?;
    }
    let scheduler_worker = scheduler.start(config.tick);

    // Shutdown signal from the API (not persisted anywhere)
    let shutdown_notify = Arc::new(Notify::new());

    // Spawn listener task
    let socket = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let ctx = Arc::new(ApiContext {
        supervisor: Arc::clone(&supervisor),
        template_dir: config.template_dir.clone(),
        logs_dir: config.logs_dir.clone(),
        environment: config.environment.clone(),
        start_time: Instant::now(),
        shutdown: Arc::clone(&shutdown_notify),
    });
    let listener = Listener::new(socket, ctx);
    tokio::spawn(listener.run());

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}:{}",
        config.host, config.port
    );

    // Signal ready for parent process (CLI waiting for startup)
    println!("READY");

    tokio::select! {
        _ = shutdown_notify.notified() => {
            info!("Shutdown requested via API");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    // Ordered shutdown: scheduler first, then the reaper, then a final
    // checkpoint, then the stdin pipes (children keep running detached).
    scheduler.stop();
    let _ = tokio::time::timeout(Duration::from_secs(2), scheduler_worker).await;
    reaper.stop();

    {
        let mut registry = registry.lock();
        registry.take_dirty();
        let checkpoint = Checkpoint::capture(&registry);
        if let Err(e) = checkpoint.save(&config.registry_path) {
            warn!(error = %e, "final checkpoint failed");
        }
    }
    supervisor.drop_all_handles();
    drop(lock_file);

    info!("Daemon stopped");
    Ok(())
}

enum LockError {
    /// Another daemon holds the lock; carries its pid when readable.
    Held(Option<String>),
    Io(std::io::Error),
}

/// Acquire the single-instance lock, writing our pid into the file.
fn acquire_lock(config: &Config) -> Result<std::fs::File, LockError> {
    use std::io::Write;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)
        .map_err(LockError::Io)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.set_len(0);
            let _ = writeln!(&file, "{}", std::process::id());
            Ok(file)
        }
        Err(_) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            Err(LockError::Held((!pid.is_empty()).then_some(pid)))
        }
    }
}

/// Restore the registry from its checkpoint and purge dead records.
fn load_registry(config: &Config) -> Registry {
    match Checkpoint::load(&config.registry_path) {
        Ok(Some(checkpoint)) => {
            let mut registry =
                Registry::restore(checkpoint.workflows, config.registry_capacity);
            let dead = registry.cleanup_dead(argo_engine::pid_alive);
            if !dead.is_empty() {
                warn!(
                    count = dead.len(),
                    "purged workflows that died while the daemon was down"
                );
            }
            registry
        }
        Ok(None) => Registry::new(config.registry_capacity),
        Err(e) => {
            warn!(error = %e, "checkpoint unreadable, starting with an empty registry");
            Registry::new(config.registry_capacity)
        }
    }
}

/// Maximum daemon log size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated daemon logs to keep (argod.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `argod.log` -> `argod.log.1` -> `argod.log.2` -> `argod.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2->.3, .1->.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log -> .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- argod: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- argod: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), std::io::Error> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write a startup error synchronously to the log file.
/// Tracing is non-blocking and may not flush before a fast exit.
fn write_startup_error(config: &Config, error: &dyn std::fmt::Display) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or("log path has no parent")?,
        config.log_path.file_name().ok_or("log path has no name")?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

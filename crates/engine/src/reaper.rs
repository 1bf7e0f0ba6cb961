// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SIGCHLD reaper task.
//!
//! The single producer for the exit queue: woken by the SIGCHLD stream,
//! it drains `waitpid(-1, WNOHANG)` until no reapable child remains and
//! pushes each `(pid, exit_code)` onto the ring. Everything else (record
//! lookup, retry policy, removal) happens later on the completion task.
//! The reaper never touches the registry and never blocks.

use argo_core::{Clock, ExitQueue, SystemClock};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to the running reaper task.
pub struct ReaperHandle {
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper. Pending exit events already pushed stay in the
    /// queue for the completion task.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Spawn the reaper task. Must be called from within the tokio runtime.
pub fn spawn_reaper(queue: Arc<ExitQueue>) -> std::io::Result<ReaperHandle> {
    let mut sigchld = signal(SignalKind::child())?;
    let clock = SystemClock;

    let task = tokio::spawn(async move {
        loop {
            if sigchld.recv().await.is_none() {
                debug!("SIGCHLD stream closed, reaper exiting");
                break;
            }
            drain_exited(&queue, clock.epoch_ms());
        }
    });

    Ok(ReaperHandle { task })
}

/// Drain every currently reapable child into the exit queue.
///
/// Signal deaths are encoded as `128 + signo` so they stay distinguishable
/// from ordinary exit codes. Returns how many children were reaped.
pub fn drain_exited(queue: &ExitQueue, epoch_ms: u64) -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                if !queue.push(pid.as_raw(), code, epoch_ms) {
                    warn!(pid = pid.as_raw(), code, "exit queue full, event dropped");
                }
                reaped += 1;
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                let code = 128 + sig as i32;
                if !queue.push(pid.as_raw(), code, epoch_ms) {
                    warn!(pid = pid.as_raw(), code, "exit queue full, event dropped");
                }
                reaped += 1;
            }
            // No reapable child right now.
            Ok(WaitStatus::StillAlive) => break,
            // Stop/continue notifications are not reaps.
            Ok(_) => continue,
            // ECHILD: no children at all.
            Err(_) => break,
        }
    }
    reaped
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow timeout watchdog.

use crate::supervisor::SharedRegistry;
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::warn;

/// How often the watchdog scans the registry.
pub const TIMEOUT_INTERVAL: Duration = Duration::from_secs(10);

/// Scans for running workflows past their `timeout_seconds` budget,
/// delivers SIGTERM, and marks them so the completion task will not
/// retry. Final removal happens on the completion task once the reaper
/// sees the child die.
pub struct TimeoutTask {
    registry: SharedRegistry,
}

impl TimeoutTask {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn run(&self) {
        self.run_at(Utc::now());
    }

    fn run_at(&self, now: DateTime<Utc>) {
        let mut registry = self.registry.lock();
        let expired: Vec<(String, Option<u32>, i64)> = registry
            .list()
            .into_iter()
            .filter(|wf| wf.timed_out(now) && !wf.abandon_requested)
            .map(|wf| {
                (
                    wf.workflow_id.as_str().to_string(),
                    wf.pid,
                    wf.elapsed_seconds(now),
                )
            })
            .collect();

        for (id, pid, elapsed) in expired {
            if let Some(wf) = registry.find_mut(&id) {
                wf.abandon_requested = true;
            }
            warn!(
                workflow_id = %id,
                pid,
                elapsed_secs = elapsed,
                "workflow exceeded its timeout, terminating"
            );
            if let Some(pid) = pid {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;

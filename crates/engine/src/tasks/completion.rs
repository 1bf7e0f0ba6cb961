// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow completion and retry.
//!
//! The single consumer of the exit queue. Each drained `(pid, exit_code)`
//! is correlated to a registry record and finalized: abandoned and
//! successful workflows are removed, failed ones are re-forked after an
//! exponential backoff until `max_retries` is exhausted.

use crate::supervisor::Supervisor;
use argo_core::{ExitEntry, ExitQueue};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often the completion task drains the exit queue.
pub const COMPLETION_INTERVAL: Duration = Duration::from_secs(5);

/// Default backoff base (seconds) for retry attempt `n`:
/// `base * 2^(n-1)`.
pub const DEFAULT_RETRY_BASE_SECS: u64 = 5;

enum Verdict {
    Removed(&'static str),
    Retry { attempt: u32, max: u32, backoff: Duration },
}

/// Drains the exit queue and applies the completion/retry policy.
pub struct CompletionTask {
    supervisor: Arc<Supervisor>,
    exit_queue: Arc<ExitQueue>,
    retry_base_secs: u64,
}

impl CompletionTask {
    pub fn new(supervisor: Arc<Supervisor>, exit_queue: Arc<ExitQueue>) -> Self {
        Self {
            supervisor,
            exit_queue,
            retry_base_secs: DEFAULT_RETRY_BASE_SECS,
        }
    }

    pub fn with_retry_base(mut self, secs: u64) -> Self {
        self.retry_base_secs = secs;
        self
    }

    pub fn run(&self) {
        let dropped = self.exit_queue.dropped();
        if dropped > 0 {
            warn!(dropped, "exit queue overflowed; child exits were lost");
        }

        while let Some(entry) = self.exit_queue.pop() {
            self.finalize(entry);
        }
    }

    fn finalize(&self, entry: ExitEntry) {
        let registry = self.supervisor.registry();

        let (id, verdict) = {
            let mut registry = registry.lock();
            let Some(wf) = registry.find_by_pid_mut(entry.pid as u32) else {
                warn!(pid = entry.pid, exit_code = entry.exit_code, "exit event for unknown pid");
                return;
            };
            let id = wf.workflow_id.as_str().to_string();
            wf.exit_code = entry.exit_code;
            wf.end_time = Some(Utc::now());

            let verdict = if wf.abandon_requested {
                Verdict::Removed("abandoned")
            } else if entry.exit_code == 0 {
                Verdict::Removed("completed")
            } else if wf.state == argo_core::WorkflowState::Running
                && wf.retry_count < wf.max_retries
            {
                wf.retry_count += 1;
                wf.last_retry_time = Some(Utc::now());
                let attempt = wf.retry_count;
                let max = wf.max_retries;
                Verdict::Retry {
                    attempt,
                    max,
                    backoff: self.backoff(attempt),
                }
            } else {
                Verdict::Removed("failed")
            };

            if let Verdict::Removed(_) = verdict {
                let _ = registry.remove(&id);
            }
            (id, verdict)
        };

        match verdict {
            Verdict::Removed(outcome) => {
                self.supervisor.drop_handle(&id);
                info!(
                    workflow_id = %id,
                    pid = entry.pid,
                    exit_code = entry.exit_code,
                    outcome,
                    "workflow finalized"
                );
            }
            Verdict::Retry { attempt, max, backoff } => {
                info!(
                    workflow_id = %id,
                    pid = entry.pid,
                    exit_code = entry.exit_code,
                    attempt,
                    max,
                    backoff_secs = backoff.as_secs(),
                    "workflow failed, scheduling retry"
                );
                let supervisor = Arc::clone(&self.supervisor);
                tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    match supervisor.respawn(&id) {
                        Ok(Some(pid)) => {
                            info!(workflow_id = %id, pid, attempt, "retry attempt started")
                        }
                        Ok(None) => {
                            // Overtaken by abandon while the backoff was
                            // pending; the child is already dead, so no
                            // further exit event will finalize the record.
                            let removed = supervisor.registry().lock().remove(&id).is_ok();
                            if removed {
                                supervisor.drop_handle(&id);
                            }
                            info!(workflow_id = %id, removed, "retry cancelled")
                        }
                        Err(e) => {
                            // Same reasoning: the old child is dead, so a
                            // failed re-spawn is a permanent failure.
                            warn!(workflow_id = %id, error = %e, "retry re-spawn failed");
                            if supervisor.registry().lock().remove(&id).is_ok() {
                                supervisor.drop_handle(&id);
                            }
                        }
                    }
                });
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_secs(self.retry_base_secs.saturating_mul(1u64 << shift))
    }
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;

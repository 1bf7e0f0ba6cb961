// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow process supervisor.
//!
//! Forks workflow scripts with redirected stdio, owns the write end of
//! each child's stdin pipe, and delivers pause/resume/terminate signals.
//! Children are spawned with `std::process::Command` (never tokio) so
//! the SIGCHLD reaper task is the only `waitpid` caller in the process.
//!
//! OS handles never live inside registry records: the supervisor keeps a
//! separate `workflow_id -> stdin` table, and the lock order is always
//! registry first, handle table second.

use crate::error::SupervisorError;
use crate::log_paths::workflow_log_path;
use crate::validate;
use argo_core::{WorkflowId, WorkflowState};
use argo_storage::{Registry, RegistryError};
use chrono::Utc;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registry shared between the supervisor, handlers, and background tasks.
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Interpreter every workflow script runs under.
const BASH: &str = "/bin/bash";

/// PATH handed to children in place of the (blocked) caller-supplied one.
const CHILD_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How long abandon waits for SIGTERM to land before escalating.
const ABANDON_GRACE: Duration = Duration::from_secs(1);

/// Poll interval while waiting out [`ABANDON_GRACE`].
const ABANDON_POLL: Duration = Duration::from_millis(50);

/// Result of a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Paused,
    AlreadyPaused,
}

/// Result of a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    AlreadyRunning,
}

/// Result of an input delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Bytes went straight down the pipe.
    Written(usize),
    /// Pipe would block; the entry is parked in the workflow's queue.
    Queued,
}

/// Check whether a pid still exists (signal 0 probe).
pub fn pid_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Owns workflow child processes and their stdin pipes.
pub struct Supervisor {
    registry: SharedRegistry,
    handles: Mutex<HashMap<WorkflowId, ChildStdin>>,
    logs_dir: PathBuf,
}

impl Supervisor {
    pub fn new(registry: SharedRegistry, logs_dir: PathBuf) -> Self {
        Self {
            registry,
            handles: Mutex::new(HashMap::new()),
            logs_dir,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Fork the child for a freshly added `pending` record.
    ///
    /// On validation or spawn failure the record is removed again so a
    /// failed start leaves no trace in the registry.
    pub fn spawn(&self, id: &str) -> Result<u32, SupervisorError> {
        match self.fork_and_attach(id, false) {
            Ok(Some(pid)) => Ok(pid),
            // Unreachable outside the retry path; treat as a lost record.
            Ok(None) => Err(RegistryError::NotFound(WorkflowId::new(id)).into()),
            Err(e) => {
                let removed = self.registry.lock().remove(id);
                if let Ok(record) = removed {
                    debug!(workflow_id = %record.workflow_id, "removed record after failed spawn");
                }
                Err(e)
            }
        }
    }

    /// Re-fork the same script after a failed attempt.
    ///
    /// Returns `Ok(None)` when the retry has been overtaken by events: the
    /// record is gone, no longer running, or abandon was requested while
    /// the backoff was pending.
    pub fn respawn(&self, id: &str) -> Result<Option<u32>, SupervisorError> {
        self.fork_and_attach(id, true)
    }

    /// Shared fork path for spawn and respawn.
    ///
    /// Returns `Ok(None)` only on the retry path, when the record was
    /// overtaken while the fork was being prepared.
    fn fork_and_attach(&self, id: &str, is_retry: bool) -> Result<Option<u32>, SupervisorError> {
        validate::workflow_id(id)?;

        // Snapshot what the fork needs; validation and the log open run
        // without the lock.
        let (script_path, args, env, retry_count, max_retries) = {
            let registry = self.registry.lock();
            let Some(wf) = registry.find(id) else {
                if is_retry {
                    return Ok(None);
                }
                return Err(RegistryError::NotFound(WorkflowId::new(id)).into());
            };
            (
                wf.script_path.clone(),
                wf.args.clone(),
                wf.env.clone(),
                wf.retry_count,
                wf.max_retries,
            )
        };

        validate::script_path(&script_path)?;
        validate::env(&env)?;

        let log_path = workflow_log_path(&self.logs_dir, id);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).map_err(SupervisorError::LogFile)?;
        }
        let mut log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(SupervisorError::LogFile)?;

        let mut command = Command::new(BASH);
        command
            .arg(&script_path)
            .args(&args)
            .env_clear()
            .env("PATH", CHILD_PATH)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped());
        if let Ok(home) = std::env::var("HOME") {
            command.env("HOME", home);
        }

        // The registry stays locked from the fork until the pid is
        // attached: a fast-exiting child must not reach the completion
        // task (which also takes this lock) before its record carries
        // the pid it will be correlated by.
        let pid = {
            let mut registry = self.registry.lock();
            match registry.find(id) {
                None if is_retry => return Ok(None),
                None => return Err(RegistryError::NotFound(WorkflowId::new(id)).into()),
                Some(wf)
                    if is_retry
                        && (wf.state != WorkflowState::Running || wf.abandon_requested) =>
                {
                    return Ok(None)
                }
                Some(_) => {}
            }

            if is_retry {
                // Stanza separating attempts in the combined log.
                writeln!(log_file, "=== RETRY ATTEMPT {}/{} ===", retry_count, max_retries)
                    .map_err(SupervisorError::LogFile)?;
            }
            let stderr_file = log_file.try_clone().map_err(SupervisorError::LogFile)?;
            command.stdout(log_file).stderr(stderr_file);

            let mut child = command.spawn().map_err(SupervisorError::Spawn)?;
            let pid = child.id();

            // The pipe write end; the Child struct itself is dropped (the
            // reaper owns wait, so no zombie bookkeeping happens here).
            let stdin = match child.stdin.take() {
                Some(stdin) => stdin,
                None => return Err(SupervisorError::NoStdinPipe),
            };
            set_nonblocking(&stdin)?;

            registry.set_running(id, pid)?;
            if let Some(wf) = registry.find_mut(id) {
                // Each attempt gets a fresh watchdog window.
                wf.start_time = Utc::now();
            }
            self.handles.lock().insert(WorkflowId::new(id), stdin);
            pid
        };

        info!(
            workflow_id = id,
            pid,
            script = %script_path.display(),
            retry = is_retry,
            "workflow process started"
        );
        Ok(Some(pid))
    }

    /// SIGSTOP a running workflow.
    pub fn pause(&self, id: &str) -> Result<PauseOutcome, SupervisorError> {
        let mut registry = self.registry.lock();
        let wf = registry
            .find(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        match wf.state {
            WorkflowState::Paused => Ok(PauseOutcome::AlreadyPaused),
            WorkflowState::Running => {
                // Guard against signalling pid 0 (our own process group)
                let pid = live_pid(wf.pid)?;
                signal_pid(pid, Signal::SIGSTOP)?;
                registry.update_state(id, WorkflowState::Paused)?;
                info!(workflow_id = id, pid, "workflow paused");
                Ok(PauseOutcome::Paused)
            }
            from => Err(RegistryError::InvalidState {
                id: WorkflowId::new(id),
                from,
                to: WorkflowState::Paused,
            }
            .into()),
        }
    }

    /// SIGCONT a paused workflow.
    pub fn resume(&self, id: &str) -> Result<ResumeOutcome, SupervisorError> {
        let mut registry = self.registry.lock();
        let wf = registry
            .find(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        match wf.state {
            WorkflowState::Running => Ok(ResumeOutcome::AlreadyRunning),
            WorkflowState::Paused => {
                let pid = live_pid(wf.pid)?;
                signal_pid(pid, Signal::SIGCONT)?;
                registry.update_state(id, WorkflowState::Running)?;
                info!(workflow_id = id, pid, "workflow resumed");
                Ok(ResumeOutcome::Resumed)
            }
            from => Err(RegistryError::InvalidState {
                id: WorkflowId::new(id),
                from,
                to: WorkflowState::Running,
            }
            .into()),
        }
    }

    /// Operator-initiated termination.
    ///
    /// Marks the record so the completion task will not retry, then
    /// escalates SIGTERM -> SIGKILL. The record itself stays in the
    /// registry until the completion task consumes the exit event;
    /// `abandon_requested` is authoritative even if the child happens to
    /// exit zero before the signal lands.
    pub async fn abandon(&self, id: &str) -> Result<(), SupervisorError> {
        let (pid, was_paused) = {
            let mut registry = self.registry.lock();
            let wf = registry
                .find_mut(id)
                .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
            if !wf.state.is_live() {
                return Err(RegistryError::InvalidState {
                    id: WorkflowId::new(id),
                    from: wf.state,
                    to: WorkflowState::Abandoned,
                }
                .into());
            }
            wf.abandon_requested = true;
            (live_pid(wf.pid)?, wf.state == WorkflowState::Paused)
        };

        info!(workflow_id = id, pid, "abandoning workflow");

        // ESRCH means the child beat us to the exit; the reaper will
        // deliver the event either way.
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => {
                return Err(SupervisorError::Signal {
                    pid: pid as i32,
                    errno,
                })
            }
        }
        if was_paused {
            // A stopped child cannot act on SIGTERM until it runs again.
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGCONT);
        }

        let deadline = tokio::time::Instant::now() + ABANDON_GRACE;
        while pid_alive(pid) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(ABANDON_POLL).await;
        }

        if pid_alive(pid) {
            warn!(workflow_id = id, pid, "SIGTERM ignored, sending SIGKILL");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }

        Ok(())
    }

    /// Deliver input bytes to a workflow's stdin.
    ///
    /// Flushes any queued backlog first, then attempts the new entry;
    /// would-block parks it in the record's queue instead. Entries are at
    /// most `PIPE_BUF` (4 KiB) so nonblocking pipe writes are all-or-
    /// nothing; the partial-write path below is a belt against platforms
    /// where that does not hold.
    pub fn deliver_input(&self, id: &str, input: String) -> Result<InputOutcome, SupervisorError> {
        let mut registry = self.registry.lock();
        let wf = registry
            .find_mut(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        if !wf.state.is_live() {
            return Err(RegistryError::InvalidState {
                id: WorkflowId::new(id),
                from: wf.state,
                to: wf.state,
            }
            .into());
        }

        let mut handles = self.handles.lock();
        let stdin = handles
            .get_mut(id)
            .ok_or(SupervisorError::NoStdinPipe)?;

        // Backlog first, to preserve delivery order.
        while let Some(entry) = wf.input_queue.dequeue() {
            match write_entry(stdin, entry.as_bytes()) {
                WriteAttempt::Written => {}
                WriteAttempt::Partial(done) => {
                    wf.input_queue.requeue_front(entry[done..].to_string());
                    wf.input_queue.enqueue(input).map_err(RegistryError::from)?;
                    return Ok(InputOutcome::Queued);
                }
                WriteAttempt::WouldBlock => {
                    wf.input_queue.requeue_front(entry);
                    wf.input_queue.enqueue(input).map_err(RegistryError::from)?;
                    return Ok(InputOutcome::Queued);
                }
                WriteAttempt::Closed => return Err(SupervisorError::PipeClosed),
            }
        }

        match write_entry(stdin, input.as_bytes()) {
            WriteAttempt::Written => Ok(InputOutcome::Written(input.len())),
            WriteAttempt::Partial(done) => {
                wf.input_queue.requeue_front(input[done..].to_string());
                Ok(InputOutcome::Queued)
            }
            WriteAttempt::WouldBlock => {
                wf.input_queue.enqueue(input).map_err(RegistryError::from)?;
                Ok(InputOutcome::Queued)
            }
            WriteAttempt::Closed => Err(SupervisorError::PipeClosed),
        }
    }

    /// Drop the stdin handle for a removed record, closing the pipe.
    pub fn drop_handle(&self, id: &str) {
        if self.handles.lock().remove(id).is_some() {
            debug!(workflow_id = id, "closed stdin pipe");
        }
    }

    /// Drop every stdin handle (daemon shutdown).
    pub fn drop_all_handles(&self) {
        self.handles.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn has_handle(&self, id: &str) -> bool {
        self.handles.lock().contains_key(id)
    }
}

/// One nonblocking write attempt against the pipe.
enum WriteAttempt {
    Written,
    Partial(usize),
    WouldBlock,
    Closed,
}

fn write_entry(stdin: &mut ChildStdin, bytes: &[u8]) -> WriteAttempt {
    match stdin.write(bytes) {
        Ok(n) if n == bytes.len() => WriteAttempt::Written,
        Ok(n) => WriteAttempt::Partial(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => WriteAttempt::WouldBlock,
        Err(_) => WriteAttempt::Closed,
    }
}

/// A live record must carry a pid; never fall back to 0, which `kill`
/// would read as "every process in our group".
fn live_pid(pid: Option<u32>) -> Result<u32, SupervisorError> {
    pid.filter(|&p| p > 0).ok_or(SupervisorError::Signal {
        pid: 0,
        errno: Errno::ESRCH,
    })
}

fn signal_pid(pid: u32, signal: Signal) -> Result<(), SupervisorError> {
    kill(Pid::from_raw(pid as i32), signal).map_err(|errno| SupervisorError::Signal {
        pid: pid as i32,
        errno,
    })
}

fn set_nonblocking(stdin: &ChildStdin) -> Result<(), SupervisorError> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    use std::os::fd::AsRawFd;

    let flags =
        fcntl(stdin.as_raw_fd(), FcntlArg::F_GETFL).map_err(SupervisorError::PipeSetup)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(stdin.as_raw_fd(), FcntlArg::F_SETFL(flags)).map_err(SupervisorError::PipeSetup)?;
    Ok(())
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

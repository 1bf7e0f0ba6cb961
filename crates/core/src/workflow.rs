// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow identifier, record, and state machine.

use crate::input_queue::InputQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a workflow instance.
    ///
    /// Derived from `template_name + "_" + instance_name` by the start
    /// handler; stable for the lifetime of the registry record.
    #[derive(Default)]
    pub struct WorkflowId;
}

/// Maximum length of a workflow ID accepted by the registry.
pub const MAX_WORKFLOW_ID_LEN: usize = 128;

/// State of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Record created, child not yet forked
    Pending,
    /// Child process is live
    Running,
    /// Child stopped via SIGSTOP
    Paused,
    /// Child exited zero
    Completed,
    /// Child exited non-zero with retries exhausted
    Failed,
    /// Operator requested termination
    Abandoned,
}

impl WorkflowState {
    /// Check whether a transition to `next` is legal.
    ///
    /// Terminal states accept no transitions; terminal records are removed
    /// from the registry rather than retained.
    pub fn can_transition(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Abandoned)
                | (Paused, Running)
                | (Paused, Abandoned)
        )
    }

    /// Check if this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Abandoned
        )
    }

    /// Check if this state has a live child process.
    pub fn is_live(self) -> bool {
        matches!(self, WorkflowState::Running | WorkflowState::Paused)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Pending => write!(f, "pending"),
            WorkflowState::Running => write!(f, "running"),
            WorkflowState::Paused => write!(f, "paused"),
            WorkflowState::Completed => write!(f, "completed"),
            WorkflowState::Failed => write!(f, "failed"),
            WorkflowState::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Configuration for creating a new workflow record
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub id: WorkflowId,
    pub script_path: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub template_name: String,
    pub branch: String,
    pub environment: String,
}

/// A workflow instance record.
///
/// OS handles are deliberately absent: `pid` is transient bookkeeping and
/// the stdin pipe lives in the supervisor's handle table. Everything else
/// survives a checkpoint round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: WorkflowId,
    pub script_path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    pub state: WorkflowState,
    /// OS pid while a child is live. Not restored on checkpoint load.
    #[serde(skip)]
    pub pid: Option<u32>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Last observed exit code; 0 before completion.
    #[serde(default)]
    pub exit_code: i32,
    /// 0 disables the timeout watchdog.
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_time: Option<DateTime<Utc>>,
    /// Set by the abandon endpoint and the timeout watchdog so the
    /// completion task does not retry.
    #[serde(default)]
    pub abandon_requested: bool,
    #[serde(default)]
    pub input_queue: InputQueue,
    pub template_name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub environment: String,
    /// Progress reported by the workflow itself via the progress endpoint.
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub step_name: String,
}

impl Workflow {
    /// Create a new record in `Pending` state.
    pub fn new(config: WorkflowConfig, start_time: DateTime<Utc>) -> Self {
        Self {
            workflow_id: config.id,
            script_path: config.script_path,
            args: config.args,
            env: config.env,
            state: WorkflowState::Pending,
            pid: None,
            start_time,
            end_time: None,
            exit_code: 0,
            timeout_seconds: config.timeout_seconds,
            retry_count: 0,
            max_retries: config.max_retries,
            last_retry_time: None,
            abandon_requested: false,
            input_queue: InputQueue::default(),
            template_name: config.template_name,
            branch: config.branch,
            environment: config.environment,
            current_step: 0,
            total_steps: 0,
            step_name: String::new(),
        }
    }

    /// Check if the record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Elapsed wall-clock seconds since the record was created (or last
    /// re-spawned, since retry updates `start_time`).
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds()
    }

    /// True when the timeout watchdog should fire for this record.
    pub fn timed_out(&self, now: DateTime<Utc>) -> bool {
        self.state == WorkflowState::Running
            && self.timeout_seconds > 0
            && self.elapsed_seconds(now) >= self.timeout_seconds as i64
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;

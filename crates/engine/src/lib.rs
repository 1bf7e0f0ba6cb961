// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Argo execution engine: process supervision, child reaping, and the
//! background housekeeping scheduler.

mod error;
pub mod log_paths;
mod reaper;
mod scheduler;
mod supervisor;
pub mod tasks;
pub mod validate;

pub use error::SupervisorError;
pub use reaper::{drain_exited, spawn_reaper, ReaperHandle};
pub use scheduler::{Scheduler, SchedulerError, DEFAULT_TICK, MAX_TASKS};
pub use supervisor::{
    pid_alive, InputOutcome, PauseOutcome, ResumeOutcome, SharedRegistry, Supervisor,
};
pub use validate::ValidationError;

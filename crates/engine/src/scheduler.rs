// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic housekeeping scheduler.
//!
//! One worker ticks at a fixed cadence and invokes every registered task
//! whose interval has elapsed. The slot table has its own mutex, held only
//! long enough to snapshot which tasks are due; task bodies run unlocked
//! so they are free to take the registry lock without ordering hazards.

use argo_core::Clock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Maximum number of registered periodic tasks.
pub const MAX_TASKS: usize = 32;

/// Default worker tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Errors from scheduler operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task table full ({MAX_TASKS} tasks)")]
    ResourceLimit,
}

type TaskFn = Box<dyn FnMut() + Send>;

struct TaskSlot {
    name: &'static str,
    interval: Duration,
    last_run: Option<Instant>,
    enabled: bool,
    /// Per-task mutex: execution is serialized per task but never holds
    /// the slot-table lock.
    task: Arc<Mutex<TaskFn>>,
}

/// Fixed-tick periodic task runner.
pub struct Scheduler<C: Clock> {
    slots: Arc<Mutex<Vec<TaskSlot>>>,
    stop: Arc<AtomicBool>,
    clock: C,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            stop: Arc::clone(&self.stop),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
            stop: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Register a periodic task. The first run happens on the next tick.
    pub fn register(
        &self,
        name: &'static str,
        interval: Duration,
        task: impl FnMut() + Send + 'static,
    ) -> Result<(), SchedulerError> {
        let mut slots = self.slots.lock();
        if slots.len() >= MAX_TASKS {
            return Err(SchedulerError::ResourceLimit);
        }
        debug!(task = name, interval_secs = interval.as_secs(), "registered periodic task");
        slots.push(TaskSlot {
            name,
            interval,
            last_run: None,
            enabled: true,
            task: Arc::new(Mutex::new(Box::new(task))),
        });
        Ok(())
    }

    /// Enable or disable a task by name. Returns false if unknown.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|s| s.name == name) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Run every due task once. Returns how many ran.
    ///
    /// The slot-table lock is released before any task body executes.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<(&'static str, Arc<Mutex<TaskFn>>)> = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .filter(|s| {
                    s.enabled
                        && s.last_run
                            .is_none_or(|last| now.duration_since(last) >= s.interval)
                })
                .map(|s| {
                    s.last_run = Some(now);
                    (s.name, Arc::clone(&s.task))
                })
                .collect()
        };

        for (name, task) in &due {
            trace!(task = name, "running periodic task");
            (task.lock())();
        }
        due.len()
    }

    /// Spawn the worker. Ticks every `tick` until [`Scheduler::stop`].
    pub fn start(&self, tick: Duration) -> JoinHandle<()>
    where
        C: 'static,
    {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if scheduler.stop.load(Ordering::Relaxed) {
                    debug!("scheduler worker stopping");
                    break;
                }
                scheduler.run_due();
            }
        })
    }

    /// Ask the worker to exit on its next tick.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

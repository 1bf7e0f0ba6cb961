// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory workflow registry.
//!
//! A keyed table of [`Workflow`] records. The registry itself carries no
//! locking: the daemon wraps it in `Arc<Mutex<Registry>>` and every
//! operation happens inside the caller's critical section. Records never
//! escape the lock except as owned clones ([`Registry::list`]).

use argo_core::{
    InputQueueError, Workflow, WorkflowId, WorkflowState, MAX_WORKFLOW_ID_LEN,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Default cap on concurrently registered workflows.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 128;

/// Errors from registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Workflow already exists")]
    Duplicate,

    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),

    #[error("illegal transition for {id}: {from} -> {to}")]
    InvalidState {
        id: WorkflowId,
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("registry full ({capacity} workflows)")]
    ResourceLimit { capacity: usize },

    #[error("workflow id is empty")]
    EmptyId,

    #[error("workflow id too long: {len} chars (max {MAX_WORKFLOW_ID_LEN})")]
    IdTooLong { len: usize },

    #[error(transparent)]
    Input(#[from] InputQueueError),
}

/// Keyed table of workflow instance records.
#[derive(Debug)]
pub struct Registry {
    workflows: HashMap<WorkflowId, Workflow>,
    capacity: usize,
    dirty: bool,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            workflows: HashMap::new(),
            capacity,
            dirty: false,
        }
    }

    /// Insert a new record.
    ///
    /// Fails with [`RegistryError::Duplicate`] if the ID is taken and
    /// [`RegistryError::ResourceLimit`] at capacity.
    pub fn add(&mut self, workflow: Workflow) -> Result<(), RegistryError> {
        let id = &workflow.workflow_id;
        if id.as_str().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if id.as_str().len() > MAX_WORKFLOW_ID_LEN {
            return Err(RegistryError::IdTooLong {
                len: id.as_str().len(),
            });
        }
        if self.workflows.len() >= self.capacity {
            return Err(RegistryError::ResourceLimit {
                capacity: self.capacity,
            });
        }
        if self.workflows.contains_key(id) {
            return Err(RegistryError::Duplicate);
        }
        self.workflows.insert(id.clone(), workflow);
        self.dirty = true;
        Ok(())
    }

    /// Borrow a record. The caller must hold the registry lock for the
    /// lifetime of the borrow.
    pub fn find(&self, id: &str) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Mutably borrow a record; marks the registry dirty on the assumption
    /// the caller mutates.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Workflow> {
        match self.workflows.get_mut(id) {
            Some(wf) => {
                self.dirty = true;
                Some(wf)
            }
            None => None,
        }
    }

    /// Borrow the record owning a live pid.
    pub fn find_by_pid(&self, pid: u32) -> Option<&Workflow> {
        self.workflows.values().find(|w| w.pid == Some(pid))
    }

    /// Mutably borrow the record owning a live pid.
    pub fn find_by_pid_mut(&mut self, pid: u32) -> Option<&mut Workflow> {
        let found = self.workflows.values_mut().find(|w| w.pid == Some(pid));
        if found.is_some() {
            self.dirty = true;
        }
        found
    }

    /// Remove a record, returning it so the caller can release attached
    /// OS resources (stdin pipe handle) after unlocking.
    pub fn remove(&mut self, id: &str) -> Result<Workflow, RegistryError> {
        match self.workflows.remove(id) {
            Some(wf) => {
                self.dirty = true;
                Ok(wf)
            }
            None => Err(RegistryError::NotFound(WorkflowId::new(id))),
        }
    }

    /// Snapshot copies of all records; the caller owns the copies.
    pub fn list(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.values().cloned().collect();
        all.sort_by(|a, b| a.workflow_id.as_str().cmp(b.workflow_id.as_str()));
        all
    }

    /// Apply a state transition, enforcing the legal transition table.
    pub fn update_state(&mut self, id: &str, next: WorkflowState) -> Result<(), RegistryError> {
        let wf = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        if !wf.state.can_transition(next) {
            return Err(RegistryError::InvalidState {
                id: wf.workflow_id.clone(),
                from: wf.state,
                to: next,
            });
        }
        wf.state = next;
        self.dirty = true;
        Ok(())
    }

    /// Attach OS process state after a successful spawn.
    ///
    /// Used once per fork: transitions `pending -> running` for the first
    /// spawn and leaves `running` in place for a retry re-spawn.
    pub fn set_running(&mut self, id: &str, pid: u32) -> Result<(), RegistryError> {
        let wf = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        match wf.state {
            WorkflowState::Pending => wf.state = WorkflowState::Running,
            WorkflowState::Running => {} // retry re-spawn keeps the state
            from => {
                return Err(RegistryError::InvalidState {
                    id: wf.workflow_id.clone(),
                    from,
                    to: WorkflowState::Running,
                });
            }
        }
        wf.pid = Some(pid);
        self.dirty = true;
        Ok(())
    }

    /// Queue an input entry for later delivery to the workflow's stdin.
    pub fn enqueue_input(&mut self, id: &str, input: String) -> Result<(), RegistryError> {
        let wf = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        wf.input_queue.enqueue(input)?;
        self.dirty = true;
        Ok(())
    }

    /// Pop the oldest queued input entry; `None` when the queue is empty.
    pub fn dequeue_input(&mut self, id: &str) -> Result<Option<String>, RegistryError> {
        let wf = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(WorkflowId::new(id)))?;
        let entry = wf.input_queue.dequeue();
        if entry.is_some() {
            self.dirty = true;
        }
        Ok(entry)
    }

    /// Startup sweep: drop records whose child no longer exists.
    ///
    /// Checkpoint loads never restore pids, so every restored record is
    /// dead by definition; records with a recorded pid are probed through
    /// `is_alive`. Returns the removed IDs so the caller can surface them.
    pub fn cleanup_dead(&mut self, is_alive: impl Fn(u32) -> bool) -> Vec<WorkflowId> {
        let dead: Vec<WorkflowId> = self
            .workflows
            .values()
            .filter(|w| !matches!(w.pid, Some(pid) if is_alive(pid)))
            .map(|w| w.workflow_id.clone())
            .collect();
        for id in &dead {
            warn!(workflow_id = %id, "removing dead workflow record");
            self.workflows.remove(id.as_str());
        }
        if !dead.is_empty() {
            self.dirty = true;
        }
        dead
    }

    /// Read and clear the dirty bit; the flush task checkpoints when set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All records, by reference, for checkpoint capture.
    pub(crate) fn records(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }

    /// Rebuild a registry from checkpointed records (transient fields stay
    /// at their defaults). Records beyond `capacity` are dropped with a
    /// warning rather than failing the load.
    pub fn restore(records: Vec<Workflow>, capacity: usize) -> Self {
        let mut registry = Self::new(capacity);
        for wf in records {
            let id = wf.workflow_id.clone();
            if let Err(e) = registry.add(wf) {
                warn!(workflow_id = %id, error = %e, "skipping checkpointed record");
            }
        }
        registry.dirty = false;
        registry
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

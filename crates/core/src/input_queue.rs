// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-workflow input FIFO.
//!
//! Producers are HTTP input handlers; the consumer is the workflow's
//! stdin pipe. Producers never block: the queue fails fast when full and
//! the caller surfaces a resource-limit error to the client.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Maximum number of queued input entries per workflow.
pub const MAX_QUEUED_INPUTS: usize = 64;

/// Maximum byte length of a single input entry (4 KiB).
pub const MAX_INPUT_LEN: usize = 4096;

/// Errors from input queue operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputQueueError {
    #[error("input queue full ({MAX_QUEUED_INPUTS} entries)")]
    Full,

    #[error("input entry too large: {size} bytes (max {MAX_INPUT_LEN})")]
    TooLarge { size: usize },
}

/// FIFO of pending input strings for one workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputQueue {
    entries: VecDeque<String>,
}

impl InputQueue {
    /// Append an entry; fails fast at capacity or on oversized input.
    pub fn enqueue(&mut self, input: String) -> Result<(), InputQueueError> {
        if input.len() > MAX_INPUT_LEN {
            return Err(InputQueueError::TooLarge { size: input.len() });
        }
        if self.entries.len() >= MAX_QUEUED_INPUTS {
            return Err(InputQueueError::Full);
        }
        self.entries.push_back(input);
        Ok(())
    }

    /// Pop the oldest entry, or `None` when empty (non-blocking).
    pub fn dequeue(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    /// Put an entry back at the head of the queue.
    ///
    /// Used for the unwritten remainder of a partially delivered entry;
    /// bypasses the capacity check since the entry was already admitted.
    pub fn requeue_front(&mut self, input: String) {
        self.entries.push_front(input);
    }

    /// Peek at the oldest entry without removing it.
    pub fn front(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "input_queue_tests.rs"]
mod tests;

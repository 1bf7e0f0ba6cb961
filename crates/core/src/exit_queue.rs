// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-free ring carrying child-exit events from the reaper to the
//! completion task.
//!
//! Single-producer (the SIGCHLD reaper task) / single-consumer (the
//! completion task) discipline: only the producer writes `tail`, only the
//! consumer writes `head`. Release stores on the indices paired with
//! Acquire loads on the opposite side make each entry's slot writes
//! visible before the index that publishes them. No mutual exclusion is
//! needed, and `push` never allocates or blocks.

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};

/// Ring capacity; must stay a power of two for index masking.
pub const EXIT_QUEUE_CAPACITY: usize = 128;

const INDEX_MASK: usize = EXIT_QUEUE_CAPACITY - 1;

/// One reaped child: pid, exit code, and when the reaper saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEntry {
    pub pid: i32,
    pub exit_code: i32,
    pub epoch_ms: u64,
}

struct Slot {
    pid: AtomicI32,
    exit_code: AtomicI32,
    epoch_ms: AtomicU64,
}

impl Slot {
    fn empty() -> Self {
        Self {
            pid: AtomicI32::new(0),
            exit_code: AtomicI32::new(0),
            epoch_ms: AtomicU64::new(0),
        }
    }
}

/// Bounded SPSC ring of [`ExitEntry`] values.
pub struct ExitQueue {
    slots: [Slot; EXIT_QUEUE_CAPACITY],
    /// Next slot to pop; written only by the consumer.
    head: AtomicUsize,
    /// Next slot to push; written only by the producer.
    tail: AtomicUsize,
    dropped: AtomicU64,
}

impl ExitQueue {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::empty()),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Producer side: append an entry.
    ///
    /// Returns `false` (and counts the drop) when the ring is full; the
    /// completion task reports the dropped count on its next run.
    pub fn push(&self, pid: i32, exit_code: i32, epoch_ms: u64) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= EXIT_QUEUE_CAPACITY {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let slot = &self.slots[tail & INDEX_MASK];
        slot.pid.store(pid, Ordering::Relaxed);
        slot.exit_code.store(exit_code, Ordering::Relaxed);
        slot.epoch_ms.store(epoch_ms, Ordering::Relaxed);

        // Publish the slot writes above.
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Consumer side: take the oldest entry, or `None` when empty.
    pub fn pop(&self) -> Option<ExitEntry> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let slot = &self.slots[head & INDEX_MASK];
        let entry = ExitEntry {
            pid: slot.pid.load(Ordering::Relaxed),
            exit_code: slot.exit_code.load(Ordering::Relaxed),
            epoch_ms: slot.epoch_ms.load(Ordering::Relaxed),
        };

        // Free the slot for the producer.
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Read and clear the count of entries lost to a full ring.
    pub fn dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "exit_queue_tests.rs"]
mod tests;

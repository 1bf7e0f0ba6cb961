// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic registry checkpoint flush.

use crate::supervisor::SharedRegistry;
use argo_storage::Checkpoint;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// How often the dirty bit is checked.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Writes the registry checkpoint whenever the dirty bit is set.
///
/// Capture happens under the registry lock (a clone of the records); the
/// file write happens after the lock is released.
pub struct FlushTask {
    registry: SharedRegistry,
    path: PathBuf,
}

impl FlushTask {
    pub fn new(registry: SharedRegistry, path: PathBuf) -> Self {
        Self { registry, path }
    }

    pub fn run(&self) {
        let checkpoint = {
            let mut registry = self.registry.lock();
            if !registry.take_dirty() {
                return;
            }
            Checkpoint::capture(&registry)
        };

        match checkpoint.save(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "registry checkpoint flushed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "checkpoint flush failed"),
        }
    }
}

#[cfg(test)]
#[path = "flush_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow log rotation.

use crate::log_paths::rotated_log_path;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// How often the rotation pass runs.
pub const ROTATE_INTERVAL: Duration = Duration::from_secs(3600);

/// Size threshold before a log is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Age threshold before a log is rotated (7 days).
pub const DEFAULT_MAX_LOG_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

/// Rotated backups kept per log (`.log.1 .. .log.N`).
pub const DEFAULT_KEEP_ROTATIONS: u32 = 3;

/// Rotates `logs_dir/*.log` files that exceed the size or age threshold,
/// shifting `file.log -> file.log.1 -> .. -> file.log.N` and dropping the
/// oldest. Rotation failures are logged and skipped; the pass never fails
/// as a whole.
pub struct LogRotateTask {
    logs_dir: PathBuf,
    max_size: u64,
    max_age: Duration,
    keep: u32,
}

impl LogRotateTask {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self {
            logs_dir,
            max_size: DEFAULT_MAX_LOG_SIZE,
            max_age: DEFAULT_MAX_LOG_AGE,
            keep: DEFAULT_KEEP_ROTATIONS,
        }
    }

    pub fn with_limits(logs_dir: PathBuf, max_size: u64, max_age: Duration, keep: u32) -> Self {
        Self {
            logs_dir,
            max_size,
            max_age,
            keep,
        }
    }

    pub fn run(&self) {
        let entries = match std::fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries,
            // Directory appears with the first spawned workflow.
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            if self.needs_rotation(&path) {
                self.rotate(&path);
            }
        }
    }

    fn needs_rotation(&self, path: &Path) -> bool {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return false,
        };
        if meta.len() >= self.max_size {
            return true;
        }
        meta.modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .is_some_and(|age| age >= self.max_age)
    }

    fn rotate(&self, path: &Path) {
        // Drop the oldest backup, then shift the chain up by one.
        let oldest = rotated_log_path(path, self.keep);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for n in (1..self.keep).rev() {
            let from = rotated_log_path(path, n);
            if from.exists() {
                let _ = std::fs::rename(&from, rotated_log_path(path, n + 1));
            }
        }
        match std::fs::rename(path, rotated_log_path(path, 1)) {
            Ok(()) => debug!(log = %path.display(), "rotated workflow log"),
            Err(e) => warn!(log = %path.display(), error = %e, "log rotation failed"),
        }
    }
}

#[cfg(test)]
#[path = "rotate_tests.rs"]
mod tests;

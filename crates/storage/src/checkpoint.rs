// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON checkpoint of the workflow registry.
//!
//! The checkpoint is advisory: the authoritative state is always the
//! in-memory registry. Its only job is to let a restarted daemon surface
//! workflows that died with it. Transient fields (pid, stdin handle) are
//! never written; a startup sweep reconciles live pids after load.

use crate::Registry;
use argo_core::Workflow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized registry contents: `{"workflows": [record...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflows: Vec<Workflow>,
    /// When this checkpoint was captured
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Capture the registry's current records.
    pub fn capture(registry: &Registry) -> Self {
        let mut workflows: Vec<Workflow> = registry.records().cloned().collect();
        workflows.sort_by(|a, b| a.workflow_id.as_str().cmp(b.workflow_id.as_str()));
        Self {
            workflows,
            created_at: Utc::now(),
        }
    }

    /// Save the checkpoint atomically (write to .tmp, fsync, rename).
    ///
    /// A crash mid-save leaves the previous checkpoint intact.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load the checkpoint if it exists.
    ///
    /// Returns `Ok(None)` when the file is absent or corrupt. A corrupt
    /// file is moved to a rotated `.bak` so the daemon can start fresh.
    pub fn load(path: &Path) -> Result<Option<Self>, CheckpointError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "Corrupt registry checkpoint, moving to .bak and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared path builders for workflow log files.
//!
//! Used by both the supervisor (writer side, handed to the child) and the
//! daemon (reader side, log tailing) to construct consistent paths:
//!   `<logs_dir>/<workflow_id>.log`

use std::path::{Path, PathBuf};

/// Build the path to a workflow's combined stdout+stderr log.
///
/// Structure: `{logs_dir}/{workflow_id}.log`
pub fn workflow_log_path(logs_dir: &Path, workflow_id: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", workflow_id))
}

/// Build the path of the `n`-th rotated backup of a log file.
///
/// Structure: `{log_path}.{n}`
pub fn rotated_log_path(log_path: &Path, n: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;

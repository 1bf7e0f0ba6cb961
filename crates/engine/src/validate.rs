// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-spawn validation of script paths, environment, and workflow IDs.
//!
//! Workflow scripts are opaque executables handed to `/bin/bash`, so the
//! supervisor refuses anything that smells like shell metacharacter
//! injection or dynamic-linker manipulation before a child is ever forked.

use std::path::{Component, Path};
use thiserror::Error;

/// Maximum workflow-ID length the supervisor accepts.
pub const MAX_SUPERVISOR_ID_LEN: usize = 256;

/// Shell metacharacters rejected anywhere in a script path.
const FORBIDDEN_PATH_CHARS: &[char] = &[
    ';', '|', '&', '$', '`', '<', '>', '(', ')', '{', '}', '[', ']', '!',
];

/// Environment keys that can alter linker or shell behavior in the child.
const BLOCKED_ENV_KEYS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "PATH",
    "IFS",
    "BASH_ENV",
    "ENV",
    "SHELLOPTS",
    "PS4",
];

/// Validation failures; all map to an invalid-input response upstream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("script path is empty")]
    EmptyPath,

    #[error("script path contains a parent-directory component")]
    PathTraversal,

    #[error("script path contains forbidden character {ch:?}")]
    ForbiddenCharacter { ch: char },

    #[error("script path is not a regular file")]
    NotARegularFile,

    #[error("invalid environment key: {key:?}")]
    InvalidEnvKey { key: String },

    #[error("blocked environment key: {key}")]
    BlockedEnvKey { key: String },

    #[error("workflow id is empty")]
    EmptyWorkflowId,

    #[error("workflow id too long: {len} chars (max {MAX_SUPERVISOR_ID_LEN})")]
    WorkflowIdTooLong { len: usize },
}

/// Validate a script path before it is handed to the child.
///
/// Rejects empty paths, `..` components, any shell metacharacter, and
/// paths that do not name a regular file on disk.
pub fn script_path(path: &Path) -> Result<(), ValidationError> {
    let raw = path.as_os_str().to_string_lossy();
    if raw.is_empty() {
        return Err(ValidationError::EmptyPath);
    }

    if let Some(ch) = raw.chars().find(|c| FORBIDDEN_PATH_CHARS.contains(c)) {
        return Err(ValidationError::ForbiddenCharacter { ch });
    }

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ValidationError::PathTraversal);
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ValidationError::NotARegularFile),
    }
}

/// Validate environment entries destined for the child.
///
/// Keys must match `[A-Za-z0-9_]+` and must not appear on the linker /
/// shell-control blocklist (`DYLD_*` is blocked as a prefix).
pub fn env(entries: &[(String, String)]) -> Result<(), ValidationError> {
    for (key, _) in entries {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidEnvKey { key: key.clone() });
        }
        if BLOCKED_ENV_KEYS.contains(&key.as_str()) || key.starts_with("DYLD_") {
            return Err(ValidationError::BlockedEnvKey { key: key.clone() });
        }
    }
    Ok(())
}

/// Validate a workflow ID at the supervisor boundary.
pub fn workflow_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyWorkflowId);
    }
    if id.len() > MAX_SUPERVISOR_ID_LEN {
        return Err(ValidationError::WorkflowIdTooLong { len: id.len() });
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

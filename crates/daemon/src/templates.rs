// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template name resolution.
//!
//! The real discovery layer lives in the CLI; the daemon only needs to
//! turn a template name into a script path under the template directory
//! (`<template_dir>/<name>.sh`). Names are restricted to a conservative
//! character set so the resolved path stays inside the directory.

use std::path::{Path, PathBuf};

/// Resolve a template name to an existing script path.
///
/// Returns `None` for unknown templates and for names that could escape
/// the template directory.
pub fn resolve(template_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }

    let path = template_dir.join(format!("{name}.sh"));
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;

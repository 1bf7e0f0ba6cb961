// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve the state directory: ARGO_STATE_DIR > ~/.argo
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ARGO_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::home_dir().map(|home| home.join(".argo"))
}

/// Listen host override (client discovery variable, honored for binding)
pub fn daemon_host() -> Option<String> {
    std::env::var("ARGO_DAEMON_HOST").ok()
}

/// Listen port override
pub fn daemon_port() -> Option<u16> {
    std::env::var("ARGO_DAEMON_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Scheduler tick override
pub fn tick_ms() -> Option<Duration> {
    std::env::var("ARGO_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Retry backoff base override (seconds)
pub fn retry_base_secs() -> Option<u64> {
    std::env::var("ARGO_RETRY_BASE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Registry capacity override
pub fn max_workflows() -> Option<usize> {
    std::env::var("ARGO_MAX_WORKFLOWS")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Template directory override
pub fn template_dir() -> Option<PathBuf> {
    std::env::var("ARGO_TEMPLATE_DIR").ok().map(PathBuf::from)
}

/// Completion / timeout task interval overrides, for tests that cannot
/// wait out the production cadence.
pub fn completion_interval() -> Option<Duration> {
    std::env::var("ARGO_COMPLETION_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

pub fn timeout_interval() -> Option<Duration> {
    std::env::var("ARGO_TIMEOUT_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

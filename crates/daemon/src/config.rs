// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: listen address, state paths, and tuning knobs.

use crate::env;
use argo_engine::tasks::{COMPLETION_INTERVAL, DEFAULT_RETRY_BASE_SECS, TIMEOUT_INTERVAL};
use argo_engine::DEFAULT_TICK;
use argo_storage::DEFAULT_REGISTRY_CAPACITY;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 9876;

/// Default environment label stamped on started workflows.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine state directory (set ARGO_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("invalid port argument: {0:?}")]
    InvalidPort(String),
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
    pub registry_path: PathBuf,
    pub template_dir: PathBuf,
    pub environment: String,
    pub registry_capacity: usize,
    pub tick: Duration,
    pub retry_base_secs: u64,
    pub completion_interval: Duration,
    pub timeout_interval: Duration,
}

impl Config {
    /// Load configuration from the environment and an optional port
    /// argument (`argod [port]`).
    pub fn load(port_arg: Option<&str>) -> Result<Self, ConfigError> {
        let port = match port_arg {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.to_string()))?,
            None => env::daemon_port().unwrap_or(DEFAULT_PORT),
        };

        let state_dir = env::state_dir().ok_or(ConfigError::NoStateDir)?;

        Ok(Self {
            host: env::daemon_host().unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            logs_dir: state_dir.join("logs"),
            log_path: state_dir.join("argod.log"),
            lock_path: state_dir.join("argod.lock"),
            registry_path: state_dir
                .join("workflows/registry/active_workflow_registry.json"),
            template_dir: env::template_dir()
                .unwrap_or_else(|| state_dir.join("workflows/templates")),
            state_dir,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            registry_capacity: env::max_workflows().unwrap_or(DEFAULT_REGISTRY_CAPACITY),
            tick: env::tick_ms().unwrap_or(DEFAULT_TICK),
            retry_base_secs: env::retry_base_secs().unwrap_or(DEFAULT_RETRY_BASE_SECS),
            completion_interval: env::completion_interval().unwrap_or(COMPLETION_INTERVAL),
            timeout_interval: env::timeout_interval().unwrap_or(TIMEOUT_INTERVAL),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

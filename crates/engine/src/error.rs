// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the supervision engine

use crate::validate::ValidationError;
use argo_storage::RegistryError;
use thiserror::Error;

/// Errors that can occur while supervising workflow processes
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to spawn workflow process: {0}")]
    Spawn(std::io::Error),

    #[error("failed to open workflow log: {0}")]
    LogFile(std::io::Error),

    #[error("failed to signal pid {pid}: {errno}")]
    Signal { pid: i32, errno: nix::errno::Errno },

    #[error("failed to configure stdin pipe: {0}")]
    PipeSetup(nix::errno::Errno),

    #[error("workflow stdin pipe is closed")]
    PipeClosed,

    #[error("workflow has no stdin pipe attached")]
    NoStdinPipe,
}

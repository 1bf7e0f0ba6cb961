// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argo Daemon library
//!
//! This module exposes the HTTP protocol types for use by API clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod http;

pub use http::{
    read_request, write_response, ProtocolError, Request, Response, DEFAULT_TIMEOUT, MAX_BODY_SIZE,
};

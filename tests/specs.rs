//! Behavioral specifications for the Argo daemon.
//!
//! These tests are black-box: they boot the real `argod` binary against a
//! temporary state directory and drive its HTTP API over a TCP socket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// daemon/
#[path = "specs/daemon/interactive.rs"]
mod daemon_interactive;
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
#[path = "specs/daemon/workflows.rs"]
mod daemon_workflows;

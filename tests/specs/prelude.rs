//! Test helpers for behavioral specifications.
//!
//! Provides a small harness that boots `argod` on a free port against a
//! temp state dir and speaks HTTP/1.1 to it over a plain TCP stream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Aggressive housekeeping cadence so scenarios finish in seconds.
const ARGO_TICK_MS: &str = "20";
const ARGO_COMPLETION_INTERVAL_MS: &str = "100";
const ARGO_TIMEOUT_INTERVAL_MS: &str = "200";
const ARGO_RETRY_BASE_SECS: &str = "0";

/// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 25;
pub const SPEC_WAIT_MAX_MS: u64 = 8000;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where argod is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the argod daemon binary.
pub fn argod_binary() -> PathBuf {
    binary_path("argod")
}

/// Grab a free TCP port from the kernel.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// A running daemon under test.
pub struct Daemon {
    child: Child,
    pub port: u16,
    state: TempDir,
}

impl Daemon {
    /// Boot the daemon with the default fast-housekeeping settings.
    pub fn start() -> Self {
        Self::start_with(&[])
    }

    /// Boot the daemon with extra environment overrides.
    pub fn start_with(extra_env: &[(&str, &str)]) -> Self {
        let state = TempDir::new().unwrap();
        let port = free_port();

        let mut cmd = Command::new(argod_binary());
        cmd.arg(port.to_string())
            .env_remove("ARGO_DAEMON_HOST")
            .env_remove("ARGO_DAEMON_PORT")
            .env("ARGO_STATE_DIR", state.path())
            .env("ARGO_TICK_MS", ARGO_TICK_MS)
            .env("ARGO_COMPLETION_INTERVAL_MS", ARGO_COMPLETION_INTERVAL_MS)
            .env("ARGO_TIMEOUT_INTERVAL_MS", ARGO_TIMEOUT_INTERVAL_MS)
            .env("ARGO_RETRY_BASE_SECS", ARGO_RETRY_BASE_SECS)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        let child = cmd.spawn().expect("spawn argod");

        let daemon = Self { child, port, state };
        daemon
            .wait_until(|| daemon.try_request("GET", "/api/health", None).is_some())
            .expect("daemon answers health checks");
        daemon
    }

    pub fn state_dir(&self) -> &Path {
        self.state.path()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state.path().join("logs")
    }

    /// Install a workflow template script.
    pub fn template(&self, name: &str, body: &str) {
        let dir = self.state.path().join("workflows/templates");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{name}.sh")), body).unwrap();
    }

    /// Fire a request, panicking on connection failure.
    pub fn request(
        &self,
        method: &str,
        target: &str,
        body: Option<&serde_json::Value>,
    ) -> (u16, serde_json::Value) {
        self.try_request(method, target, body)
            .expect("daemon connection")
    }

    /// Fire a request; `None` when the daemon is not answering.
    pub fn try_request(
        &self,
        method: &str,
        target: &str,
        body: Option<&serde_json::Value>,
    ) -> Option<(u16, serde_json::Value)> {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).ok()?;
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            payload.len(),
            payload
        );
        stream.write_all(raw.as_bytes()).ok()?;

        // Connection: close, so read to EOF and split the response.
        let mut response = String::new();
        stream.read_to_string(&mut response).ok()?;
        let status: u16 = response.split_whitespace().nth(1)?.parse().ok()?;
        let body_text = response
            .split_once("\r\n\r\n")
            .map(|(_, b)| b)
            .unwrap_or_default();
        let json = if body_text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(body_text).ok()?
        };
        Some((status, json))
    }

    /// Poll until the condition holds or the spec timeout elapses.
    pub fn wait_until(&self, mut check: impl FnMut() -> bool) -> Result<(), String> {
        let deadline = Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
        while Instant::now() < deadline {
            if check() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
        }
        Err("condition not met before timeout".to_string())
    }

    /// Workflow IDs currently known to the daemon.
    pub fn list_ids(&self) -> Vec<String> {
        let (status, body) = self.request("GET", "/api/workflow/list", None);
        assert_eq!(status, 200);
        body["workflows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["workflow_id"].as_str().unwrap().to_string())
            .collect()
    }

    /// Read a workflow's combined log.
    pub fn log_contents(&self, workflow_id: &str) -> String {
        std::fs::read_to_string(self.logs_dir().join(format!("{workflow_id}.log")))
            .unwrap_or_default()
    }

    /// Ask the daemon to exit and wait for the process to go away.
    pub fn shutdown(mut self) -> std::process::ExitStatus {
        let _ = self.try_request("POST", "/api/shutdown", None);
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return status;
            }
            if Instant::now() >= deadline {
                let _ = self.child.kill();
                return self.child.wait().unwrap();
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.try_request("POST", "/api/shutdown", None);
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

//! Daemon lifecycle: flags, startup, shutdown, and the instance lock.

use crate::prelude::*;
use assert_cmd::prelude::*;
use serial_test::serial;
use std::process::Command;

#[test]
fn version_flag_prints_and_exits() {
    let output = Command::new(argod_binary())
        .arg("--version")
        .output()
        .unwrap();
    output.clone().assert().success();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("argod "));
}

#[test]
fn help_flag_documents_usage() {
    let output = Command::new(argod_binary()).arg("--help").output().unwrap();
    output.clone().assert().success();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("USAGE"));
    assert!(stdout.contains("argod [port]"));
}

#[test]
fn unexpected_port_argument_is_rejected() {
    Command::new(argod_binary())
        .arg("not-a-port")
        .env("ARGO_STATE_DIR", tempfile::tempdir().unwrap().path())
        .assert()
        .failure();
}

#[test]
#[serial]
fn daemon_answers_health_and_version() {
    let daemon = Daemon::start();

    let (status, body) = daemon.request("GET", "/api/health", None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let (status, body) = daemon.request("GET", "/api/version", None);
    assert_eq!(status, 200);
    assert!(body["version"].as_str().unwrap().contains('.'));
    assert_eq!(body["api_version"], "1");
}

#[test]
#[serial]
fn shutdown_endpoint_stops_the_daemon() {
    let daemon = Daemon::start();
    let (status, body) = daemon.request("POST", "/api/shutdown", None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "shutting down");

    let exit = daemon.shutdown();
    assert!(exit.success());
}

#[test]
#[serial]
fn second_daemon_on_same_state_dir_is_refused() {
    let daemon = Daemon::start();

    let output = Command::new(argod_binary())
        .arg("0")
        .env("ARGO_STATE_DIR", daemon.state_dir())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("argod is already running"));
}

#[test]
#[serial]
fn daemon_log_carries_a_startup_marker() {
    let daemon = Daemon::start();
    let log = std::fs::read_to_string(daemon.state_dir().join("argod.log")).unwrap();
    assert!(log.contains("--- argod: starting (pid: "));
}

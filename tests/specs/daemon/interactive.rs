//! Interactive I/O scenarios: stdin delivery, log tailing, pause/resume.

use crate::prelude::*;
use serde_json::json;
use serial_test::serial;

#[test]
#[serial]
fn input_is_delivered_to_the_workflow_stdin() {
    let daemon = Daemon::start();
    daemon.template("greeter", "read line\necho \"Hello $line\"\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "greeter", "instance": "g"})),
    );

    let (status, body) = daemon.request(
        "POST",
        "/api/workflow/input?workflow_name=greeter_g",
        Some(&json!({"input": "world\n"})),
    );
    assert_eq!(status, 200);
    // Either direct write or queued is a success; the pipe is empty here
    // so the bytes go straight through.
    assert_eq!(body["bytes_written"], 6);

    daemon
        .wait_until(|| daemon.log_contents("greeter_g").contains("Hello world"))
        .unwrap();
}

#[test]
#[serial]
fn output_endpoint_follows_a_byte_cursor() {
    let daemon = Daemon::start();
    daemon.template("talker", "echo one\necho two\nsleep 5\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "talker", "instance": "o"})),
    );

    daemon
        .wait_until(|| daemon.log_contents("talker_o").contains("two"))
        .unwrap();

    let (status, body) = daemon.request(
        "GET",
        "/api/workflow/output?workflow_name=talker_o&since=0",
        None,
    );
    assert_eq!(status, 200);
    let content = body["content"].as_str().unwrap();
    assert!(content.contains("one") && content.contains("two"));
    let offset = body["offset"].as_u64().unwrap();
    assert_eq!(offset as usize, content.len());

    // No new bytes past the cursor
    let (status, _) = daemon.request(
        "GET",
        &format!("/api/workflow/output?workflow_name=talker_o&since={offset}"),
        None,
    );
    assert_eq!(status, 204);

    daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=talker_o",
        None,
    );
}

#[test]
#[serial]
fn paused_workflow_stops_writing_until_resumed() {
    let daemon = Daemon::start();
    daemon.template(
        "ticker",
        "for i in $(seq 1 200); do echo tick-$i; sleep 0.05; done\n",
    );
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "ticker", "instance": "p"})),
    );
    daemon
        .wait_until(|| !daemon.log_contents("ticker_p").is_empty())
        .unwrap();

    let (status, body) = daemon.request(
        "POST",
        "/api/workflow/pause?workflow_name=ticker_p",
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body["action"], "paused");

    // SIGSTOP has landed; the log stops growing
    std::thread::sleep(std::time::Duration::from_millis(300));
    let frozen_size = daemon.log_contents("ticker_p").len();
    std::thread::sleep(std::time::Duration::from_millis(500));
    assert_eq!(daemon.log_contents("ticker_p").len(), frozen_size);

    // A tail from the frozen end has nothing to report
    let (status, _) = daemon.request(
        "GET",
        &format!("/api/workflow/output?workflow_name=ticker_p&since={frozen_size}"),
        None,
    );
    assert_eq!(status, 204);

    let (status, body) = daemon.request(
        "POST",
        "/api/workflow/resume?workflow_name=ticker_p",
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body["action"], "resumed");

    daemon
        .wait_until(|| daemon.log_contents("ticker_p").len() > frozen_size)
        .unwrap();

    daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=ticker_p",
        None,
    );
}

#[test]
#[serial]
fn input_to_a_paused_workflow_is_accepted() {
    let daemon = Daemon::start();
    daemon.template("patient", "read line\necho \"got $line\"\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "patient", "instance": "q"})),
    );
    daemon.request("POST", "/api/workflow/pause?workflow_name=patient_q", None);

    // Paused consumers still have an open pipe; the write lands in the
    // pipe buffer (or the queue) without error.
    let (status, _) = daemon.request(
        "POST",
        "/api/workflow/input?workflow_name=patient_q",
        Some(&json!({"input": "later\n"})),
    );
    assert_eq!(status, 200);

    daemon.request("POST", "/api/workflow/resume?workflow_name=patient_q", None);
    daemon
        .wait_until(|| daemon.log_contents("patient_q").contains("got later"))
        .unwrap();
}

#[test]
#[serial]
fn input_endpoints_reject_unknown_workflows() {
    let daemon = Daemon::start();

    let (status, _) = daemon.request(
        "POST",
        "/api/workflow/input?workflow_name=ghost",
        Some(&json!({"input": "x"})),
    );
    assert_eq!(status, 404);

    let (status, _) = daemon.request("GET", "/api/workflow/input?workflow_name=ghost", None);
    assert_eq!(status, 404);

    let (status, _) = daemon.request("GET", "/api/workflow/output?workflow_name=ghost", None);
    assert_eq!(status, 404);

    let (status, _) = daemon.request("POST", "/api/workflow/input", None);
    assert_eq!(status, 400);
}

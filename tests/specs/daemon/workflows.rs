//! Workflow lifecycle scenarios: start, list, completion, duplicates,
//! timeouts, and the retry policy.

use crate::prelude::*;
use serde_json::json;
use serial_test::serial;

#[test]
#[serial]
fn started_workflow_completes_and_leaves_the_registry() {
    let daemon = Daemon::start();
    daemon.template("hi", "echo done\nexit 0\n");

    let (status, body) = daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "hi", "instance": "a"})),
    );
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["workflow_id"], "hi_a");
    assert_eq!(body["environment"], "dev");

    // The completion task reaps the zero exit and removes the record
    daemon
        .wait_until(|| !daemon.list_ids().contains(&"hi_a".to_string()))
        .unwrap();

    // The log file is retained after removal
    assert!(daemon.log_contents("hi_a").contains("done"));
}

#[test]
#[serial]
fn start_requires_a_known_template() {
    let daemon = Daemon::start();

    let (status, body) = daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "ghost", "instance": "a"})),
    );
    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");

    let (status, _) = daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"instance": "a"})),
    );
    assert_eq!(status, 400);
}

#[test]
#[serial]
fn duplicate_start_is_conflict() {
    let daemon = Daemon::start();
    daemon.template("hold", "sleep 5\n");

    let body = json!({"template": "hold", "instance": "a"});
    let (status, _) = daemon.request("POST", "/api/workflow/start", Some(&body));
    assert_eq!(status, 200);

    let (status, response) = daemon.request("POST", "/api/workflow/start", Some(&body));
    assert_eq!(status, 409);
    assert_eq!(response["message"], "Workflow already exists");

    let (status, _) = daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=hold_a",
        None,
    );
    assert_eq!(status, 200);
}

#[test]
#[serial]
fn status_tracks_a_running_workflow() {
    let daemon = Daemon::start();
    daemon.template("hold", "sleep 5\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "hold", "instance": "s"})),
    );

    let (status, body) = daemon.request("GET", "/api/workflow/status?workflow_name=hold_s", None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "running");
    assert_eq!(body["template"], "hold");
    assert!(body["pid"].as_u64().unwrap() > 0);

    let (status, _) = daemon.request("GET", "/api/workflow/status?workflow_name=ghost", None);
    assert_eq!(status, 404);

    let (status, _) = daemon.request("GET", "/api/workflow/status", None);
    assert_eq!(status, 400);

    daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=hold_s",
        None,
    );
}

#[test]
#[serial]
fn abandoned_workflow_is_finalized_without_retry() {
    let daemon = Daemon::start();
    daemon.template("hold", "sleep 30\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "hold", "instance": "x", "max_retries": 3})),
    );

    let (status, body) = daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=hold_x",
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body["action"], "abandoned");

    // Despite the retry budget, the completion task removes the record
    daemon
        .wait_until(|| !daemon.list_ids().contains(&"hold_x".to_string()))
        .unwrap();
}

#[test]
#[serial]
fn timed_out_workflow_is_terminated_and_removed() {
    let daemon = Daemon::start();
    daemon.template("stuck", "sleep 60\n");

    let (status, _) = daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "stuck", "instance": "t", "timeout_seconds": 1})),
    );
    assert_eq!(status, 200);

    // Watchdog SIGTERMs after ~1s; completion finalizes shortly after
    daemon
        .wait_until(|| !daemon.list_ids().contains(&"stuck_t".to_string()))
        .unwrap();
}

#[test]
#[serial]
fn failed_workflow_is_retried_with_stanzas_then_removed() {
    let daemon = Daemon::start();
    daemon.template("flaky", "echo attempt\nexit 1\n");

    let (status, _) = daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "flaky", "instance": "r", "max_retries": 2})),
    );
    assert_eq!(status, 200);

    // Two retries, then permanent failure removes the record
    daemon
        .wait_until(|| !daemon.list_ids().contains(&"flaky_r".to_string()))
        .unwrap();

    let log = daemon.log_contents("flaky_r");
    assert!(log.contains("=== RETRY ATTEMPT 1/2 ==="));
    assert!(log.contains("=== RETRY ATTEMPT 2/2 ==="));
    assert_eq!(log.matches("attempt").count(), 3, "three execution stanzas");
}

#[test]
#[serial]
fn registry_checkpoint_is_written() {
    let daemon = Daemon::start();
    daemon.template("hold", "sleep 5\n");
    daemon.request(
        "POST",
        "/api/workflow/start",
        Some(&json!({"template": "hold", "instance": "c"})),
    );

    let checkpoint = daemon
        .state_dir()
        .join("workflows/registry/active_workflow_registry.json");
    daemon.wait_until(|| checkpoint.exists()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&checkpoint).unwrap()).unwrap();
    let ids: Vec<&str> = raw["workflows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|wf| wf["workflow_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"hold_c"));

    daemon.request(
        "DELETE",
        "/api/workflow/abandon?workflow_name=hold_c",
        None,
    );
}

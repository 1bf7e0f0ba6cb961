// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn test_config(dir: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        state_dir: dir.to_path_buf(),
        logs_dir: dir.join("logs"),
        log_path: dir.join("argod.log"),
        lock_path: dir.join("argod.lock"),
        registry_path: dir.join("workflows/registry/active_workflow_registry.json"),
        template_dir: dir.join("workflows/templates"),
        environment: "dev".to_string(),
        registry_capacity: 8,
        tick: Duration::from_millis(100),
        retry_base_secs: 5,
        completion_interval: Duration::from_secs(5),
        timeout_interval: Duration::from_secs(10),
    }
}

#[test]
fn small_log_is_not_rotated() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("argod.log");
    std::fs::write(&log, "tiny").unwrap();

    rotate_log_if_needed(&log);
    assert!(log.exists());
    assert!(!dir.path().join("argod.log.1").exists());
}

#[test]
fn oversized_log_rotates_through_chain() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("argod.log");
    std::fs::write(&log, vec![b'x'; (MAX_LOG_SIZE + 1) as usize]).unwrap();
    std::fs::write(dir.path().join("argod.log.1"), "old-1").unwrap();

    rotate_log_if_needed(&log);

    assert!(!log.exists());
    assert_eq!(
        std::fs::read(dir.path().join("argod.log.1")).unwrap().len(),
        (MAX_LOG_SIZE + 1) as usize
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("argod.log.2")).unwrap(),
        "old-1"
    );
}

#[test]
fn startup_marker_is_appended() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_startup_marker(&config).unwrap();
    write_startup_marker(&config).unwrap();

    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert_eq!(log.matches(STARTUP_MARKER_PREFIX).count(), 2);
    assert!(log.contains(&format!("(pid: {})", std::process::id())));
}

#[test]
fn startup_error_is_written_synchronously() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_startup_error(&config, &"socket in use");
    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("ERROR Failed to start daemon: socket in use"));
}

#[test]
fn lock_is_exclusive_per_state_dir() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let held = acquire_lock(&config).ok().unwrap();
    assert_eq!(
        std::fs::read_to_string(&config.lock_path).unwrap().trim(),
        std::process::id().to_string()
    );

    // Same process re-acquiring on a second handle fails
    match acquire_lock(&config) {
        Err(LockError::Held(Some(pid))) => {
            assert_eq!(pid, std::process::id().to_string());
        }
        _ => panic!("second acquisition must fail with the holder pid"),
    }

    drop(held);
    assert!(acquire_lock(&config).is_ok());
}

#[test]
fn load_registry_without_checkpoint_is_empty() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let registry = load_registry(&config);
    assert!(registry.is_empty());
    assert_eq!(registry.capacity(), 8);
}

#[test]
fn load_registry_purges_dead_checkpointed_records() {
    use argo_core::{Workflow, WorkflowConfig, WorkflowId};

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    // Checkpoint with one record; pids are not persisted, so after a
    // restart it has no live child and must be swept.
    let mut registry = Registry::new(8);
    registry
        .add(Workflow::new(
            WorkflowConfig {
                id: WorkflowId::new("dead_a"),
                script_path: "/tmp/t.sh".into(),
                args: vec![],
                env: vec![],
                timeout_seconds: 0,
                max_retries: 0,
                template_name: "t".to_string(),
                branch: String::new(),
                environment: "dev".to_string(),
            },
            chrono::Utc::now(),
        ))
        .unwrap();
    Checkpoint::capture(&registry)
        .save(&config.registry_path)
        .unwrap();

    let restored = load_registry(&config);
    assert!(restored.is_empty());
}

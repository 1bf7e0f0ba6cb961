// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow lifecycle handlers: start, pause, resume, abandon.

use super::{require_workflow_name, supervisor_error_response, ApiContext};
use crate::http::{Request, Response};
use crate::templates;
use argo_core::{Workflow, WorkflowConfig, WorkflowId};
use argo_engine::{PauseOutcome, ResumeOutcome};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
struct StartRequest {
    template: String,
    instance: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
}

pub(super) fn handle_start(ctx: &ApiContext, request: &Request) -> Response {
    let start: StartRequest = match request.json_body() {
        Ok(body) => body,
        Err(e) => return Response::error(400, e),
    };
    if start.template.is_empty() || start.instance.is_empty() {
        return Response::error(400, "Missing required field: template/instance");
    }

    let Some(script_path) = templates::resolve(&ctx.template_dir, &start.template) else {
        return Response::error(404, format!("Template not found: {}", start.template));
    };

    let workflow_id = format!("{}_{}", start.template, start.instance);
    let environment = start
        .environment
        .unwrap_or_else(|| ctx.environment.clone());

    let record = Workflow::new(
        WorkflowConfig {
            id: WorkflowId::new(&workflow_id),
            script_path,
            args: vec![],
            env: vec![],
            timeout_seconds: start.timeout_seconds.unwrap_or(0),
            max_retries: start.max_retries.unwrap_or(0),
            template_name: start.template,
            branch: start.branch.unwrap_or_default(),
            environment: environment.clone(),
        },
        Utc::now(),
    );

    if let Err(e) = ctx.supervisor.registry().lock().add(record) {
        return super::registry_error_response(e);
    }

    match ctx.supervisor.spawn(&workflow_id) {
        Ok(pid) => {
            info!(workflow_id = %workflow_id, pid, "workflow started");
            Response::ok(&json!({
                "status": "success",
                "workflow_id": workflow_id,
                "environment": environment,
            }))
        }
        Err(e) => supervisor_error_response(e),
    }
}

pub(super) fn handle_pause(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ctx.supervisor.pause(id) {
        Ok(PauseOutcome::Paused) => Response::ok(&json!({
            "status": "success",
            "workflow_id": id,
            "action": "paused",
        })),
        Ok(PauseOutcome::AlreadyPaused) => Response::ok(&json!({"status": "already_paused"})),
        Err(e) => supervisor_error_response(e),
    }
}

pub(super) fn handle_resume(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ctx.supervisor.resume(id) {
        Ok(ResumeOutcome::Resumed) => Response::ok(&json!({
            "status": "success",
            "workflow_id": id,
            "action": "resumed",
        })),
        Ok(ResumeOutcome::AlreadyRunning) => Response::ok(&json!({"status": "already_running"})),
        Err(e) => supervisor_error_response(e),
    }
}

pub(super) async fn handle_abandon(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ctx.supervisor.abandon(id).await {
        Ok(()) => Response::ok(&json!({
            "status": "success",
            "workflow_id": id,
            "action": "abandoned",
        })),
        Err(e) => supervisor_error_response(e),
    }
}

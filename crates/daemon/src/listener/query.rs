// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers: health, version, list, status.

use super::{require_workflow_name, ApiContext};
use crate::http::{Request, Response};
use serde_json::json;

/// API protocol version reported to clients.
pub const API_VERSION: &str = "1";

pub(super) fn handle_health(ctx: &ApiContext) -> Response {
    let active = ctx.supervisor.registry().lock().len();
    Response::ok(&json!({
        "status": "ok",
        "uptime_seconds": ctx.start_time.elapsed().as_secs(),
        "active_workflows": active,
    }))
}

pub(super) fn handle_version() -> Response {
    Response::ok(&json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": API_VERSION,
    }))
}

pub(super) fn handle_list(ctx: &ApiContext) -> Response {
    let rows: Vec<serde_json::Value> = ctx
        .supervisor
        .registry()
        .lock()
        .list()
        .into_iter()
        .map(|wf| {
            json!({
                "workflow_id": wf.workflow_id,
                "status": wf.state.to_string(),
                "pid": wf.pid.unwrap_or(0),
            })
        })
        .collect();

    Response::ok(&json!({"workflows": rows}))
}

pub(super) fn handle_status(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let registry = ctx.supervisor.registry().lock();
    match registry.find(id) {
        Some(wf) => Response::ok(&json!({
            "workflow_id": wf.workflow_id,
            "status": wf.state.to_string(),
            "pid": wf.pid.unwrap_or(0),
            "template": wf.template_name,
            "current_step": wf.current_step,
            "total_steps": wf.total_steps,
            "step_name": wf.step_name,
        })),
        None => Response::error(404, format!("Workflow not found: {id}")),
    }
}

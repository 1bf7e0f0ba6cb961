// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive I/O handlers: stdin input delivery and log tailing.

use super::{registry_error_response, require_workflow_name, supervisor_error_response, ApiContext};
use crate::http::{Request, Response};
use argo_engine::log_paths::workflow_log_path;
use argo_engine::InputOutcome;
use serde::Deserialize;
use serde_json::json;
use std::io::{Read, Seek, SeekFrom};

/// Largest slice of log returned per tail request (64 KiB); callers poll
/// with the returned offset for more.
pub const MAX_OUTPUT_CHUNK: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct InputRequest {
    input: String,
}

#[derive(Debug, Deserialize)]
struct ProgressRequest {
    current_step: u32,
    total_steps: u32,
    step_name: String,
}

pub(super) fn handle_input_post(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };
    // serde_json has already unescaped \n, \t, \" and friends here.
    let body: InputRequest = match request.json_body() {
        Ok(body) => body,
        Err(e) => return Response::error(400, e),
    };

    match ctx.supervisor.deliver_input(id, body.input) {
        Ok(InputOutcome::Written(n)) => Response::ok(&json!({
            "status": "success",
            "workflow_id": id,
            "bytes_written": n,
        })),
        Ok(InputOutcome::Queued) => Response::ok(&json!({
            "status": "success",
            "workflow_id": id,
            "queued": true,
        })),
        Err(e) => supervisor_error_response(e),
    }
}

pub(super) fn handle_input_get(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ctx.supervisor.registry().lock().dequeue_input(id) {
        Ok(Some(input)) => Response::ok(&json!({
            "workflow_id": id,
            "input": input,
        })),
        Ok(None) => Response::no_content(),
        Err(e) => registry_error_response(e),
    }
}

pub(super) fn handle_output(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let since: u64 = match request.query_param("since").unwrap_or("0").parse() {
        Ok(offset) => offset,
        Err(_) => return Response::error(400, "invalid since offset"),
    };

    // Existence check under the lock; the file read happens after release.
    if ctx.supervisor.registry().lock().find(id).is_none() {
        return Response::error(404, format!("Workflow not found: {id}"));
    }

    let log_path = workflow_log_path(&ctx.logs_dir, id);
    let mut file = match std::fs::File::open(&log_path) {
        Ok(file) => file,
        Err(_) => return Response::no_content(),
    };
    let size = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => return Response::error(500, e),
    };
    if since >= size {
        return Response::no_content();
    }

    if let Err(e) = file.seek(SeekFrom::Start(since)) {
        return Response::error(500, e);
    }
    let mut buf = vec![0u8; MAX_OUTPUT_CHUNK.min((size - since) as usize)];
    let read = match file.read(&mut buf) {
        Ok(read) => read,
        Err(e) => return Response::error(500, e),
    };
    buf.truncate(read);

    Response::ok(&json!({
        "workflow_id": id,
        "offset": since + read as u64,
        "content": String::from_utf8_lossy(&buf),
    }))
}

pub(super) fn handle_progress(ctx: &ApiContext, request: &Request) -> Response {
    let id = match require_workflow_name(request) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let progress: ProgressRequest = match request.json_body() {
        Ok(body) => body,
        Err(e) => return Response::error(400, e),
    };

    let mut registry = ctx.supervisor.registry().lock();
    match registry.find_mut(id) {
        Some(wf) => {
            wf.current_step = progress.current_step;
            wf.total_steps = progress.total_steps;
            wf.step_name = progress.step_name;
            Response::ok(&json!({"status": "success"}))
        }
        None => Response::error(404, format!("Workflow not found: {id}")),
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling HTTP connections.
//!
//! The Listener runs in a spawned task, accepting connections and
//! handling each on its own task so slow clients never block the
//! daemon. Handlers translate parsed requests into registry/supervisor
//! calls; every handler releases the registry lock before file I/O and
//! never waits for workflow state changes.

mod io;
mod query;
mod workflows;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use argo_engine::{Supervisor, SupervisorError};
use argo_storage::RegistryError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::http::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};

/// Shared daemon context for all request handlers.
pub(crate) struct ApiContext {
    pub supervisor: Arc<Supervisor>,
    pub template_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub environment: String,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting API connections.
pub(crate) struct Listener {
    socket: TcpListener,
    ctx: Arc<ApiContext>,
}

impl Listener {
    /// Create a new listener.
    pub fn new(socket: TcpListener, ctx: Arc<ApiContext>) -> Self {
        Self { socket, ctx }
    }

    /// Run the listener loop until shutdown, spawning tasks per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ProtocolError::ConnectionClosed => debug!("Client disconnected"),
                                ProtocolError::Timeout => warn!("Connection timeout"),
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection (one request, one response).
async fn handle_connection(stream: TcpStream, ctx: &ApiContext) -> Result<(), ProtocolError> {
    let (reader, mut writer) = stream.into_split();

    let response = match http::read_request_timeout(reader, DEFAULT_TIMEOUT).await {
        Ok(request) => {
            debug!(method = %request.method, path = %request.path, "received request");
            handle_request(&request, ctx).await
        }
        Err(ProtocolError::ConnectionClosed) => return Err(ProtocolError::ConnectionClosed),
        Err(ProtocolError::Timeout) => return Err(ProtocolError::Timeout),
        Err(e) => {
            // Malformed requests still get an answer before the close.
            debug!(error = %e, "rejecting malformed request");
            Response::error(400, e)
        }
    };

    http::write_response_timeout(&mut writer, &response, DEFAULT_TIMEOUT).await
}

/// Route a parsed request to its handler.
async fn handle_request(request: &Request, ctx: &ApiContext) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/api/health") => query::handle_health(ctx),
        ("GET", "/api/version") => query::handle_version(),

        ("POST", "/api/shutdown") => {
            ctx.shutdown.notify_one();
            Response::ok(&serde_json::json!({"status": "shutting down"}))
        }

        ("POST", "/api/workflow/start") => workflows::handle_start(ctx, request),
        ("GET", "/api/workflow/list") => query::handle_list(ctx),
        ("GET", "/api/workflow/status") => query::handle_status(ctx, request),
        ("POST", "/api/workflow/pause") => workflows::handle_pause(ctx, request),
        ("POST", "/api/workflow/resume") => workflows::handle_resume(ctx, request),
        ("DELETE", "/api/workflow/abandon") => workflows::handle_abandon(ctx, request).await,
        ("POST", "/api/workflow/input") => io::handle_input_post(ctx, request),
        ("GET", "/api/workflow/input") => io::handle_input_get(ctx, request),
        ("GET", "/api/workflow/output") => io::handle_output(ctx, request),
        ("POST", "/api/workflow/progress") => io::handle_progress(ctx, request),

        (_, path) if known_path(path) => Response::error(405, "method not allowed"),
        _ => Response::error(404, "unknown route"),
    }
}

fn known_path(path: &str) -> bool {
    matches!(
        path,
        "/api/health"
            | "/api/version"
            | "/api/shutdown"
            | "/api/workflow/start"
            | "/api/workflow/list"
            | "/api/workflow/status"
            | "/api/workflow/pause"
            | "/api/workflow/resume"
            | "/api/workflow/abandon"
            | "/api/workflow/input"
            | "/api/workflow/output"
            | "/api/workflow/progress"
    )
}

/// Pull the workflow identity out of the query string.
fn require_workflow_name(request: &Request) -> Result<&str, Response> {
    match request.query_param("workflow_name") {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Response::error(400, "Missing workflow_name parameter")),
    }
}

/// Translate engine errors into API status codes.
fn supervisor_error_response(error: SupervisorError) -> Response {
    match error {
        SupervisorError::Validation(e) => Response::error(400, e),
        SupervisorError::Registry(e) => registry_error_response(e),
        other => Response::error(500, other),
    }
}

fn registry_error_response(error: RegistryError) -> Response {
    match error {
        RegistryError::Duplicate => Response::error(409, error),
        RegistryError::NotFound(_) => Response::error(404, error),
        RegistryError::EmptyId | RegistryError::IdTooLong { .. } => Response::error(400, error),
        RegistryError::InvalidState { .. }
        | RegistryError::ResourceLimit { .. }
        | RegistryError::Input(_) => Response::error(500, error),
    }
}

#[cfg(test)]
pub(crate) fn test_ctx(dir: &std::path::Path) -> ApiContext {
    use argo_storage::Registry;
    use parking_lot::Mutex;

    let registry = Arc::new(Mutex::new(Registry::new(16)));
    let supervisor = Arc::new(Supervisor::new(registry, dir.join("logs")));
    ApiContext {
        supervisor,
        template_dir: dir.join("templates"),
        logs_dir: dir.join("logs"),
        environment: "dev".to_string(),
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;

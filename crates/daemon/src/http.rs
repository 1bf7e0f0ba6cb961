// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP/1.1 wire codec for the daemon API.
//!
//! Parses one request per connection (the server always answers with
//! `Connection: close`) into a [`Request`] the route handlers consume,
//! and serializes [`Response`] values with JSON bodies. Bodies are
//! bounded and both directions run under a timeout.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

/// Maximum accepted request body (64 KiB).
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Maximum accepted request-line / header line length.
const MAX_LINE_LEN: usize = 8 * 1024;

/// Default socket timeout for reading a request or writing a response.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed request: {0}")]
    Malformed(&'static str),

    #[error("request body too large: {size} bytes (max {MAX_BODY_SIZE})")]
    BodyTooLarge { size: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// One parsed HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Fetch a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Deserialize the JSON body into a typed request struct.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// One HTTP response with a JSON (or empty) body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// A JSON response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    /// A `200 OK` JSON response.
    pub fn ok(body: &serde_json::Value) -> Self {
        Self::json(200, body)
    }

    /// A `204 No Content` response (no body at all).
    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: String::new(),
        }
    }

    /// An error response with the standard `{status, message}` body.
    pub fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self::json(
            status,
            &serde_json::json!({
                "status": "error",
                "message": message.to_string(),
            }),
        )
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Split a request target into path and query map.
///
/// No percent-decoding: workflow IDs and byte offsets are plain ASCII.
fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        None => (target.to_string(), HashMap::new()),
        Some((path, query)) => {
            let params = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .collect();
            (path.to_string(), params)
        }
    }
}

async fn read_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut line = Vec::new();
    let n = reader
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if line.len() > MAX_LINE_LEN {
        return Err(ProtocolError::Malformed("header line too long"));
    }
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| ProtocolError::Malformed("non-UTF8 header"))
}

/// Read and parse one request from the stream.
pub async fn read_request<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
) -> Result<Request, ProtocolError> {
    let mut reader = BufReader::new(reader);

    let request_line = read_line(&mut reader).await?;
    let mut parts = request_line.split_ascii_whitespace();
    let method = parts
        .next()
        .ok_or(ProtocolError::Malformed("empty request line"))?
        .to_string();
    let target = parts
        .next()
        .ok_or(ProtocolError::Malformed("missing request target"))?;
    match parts.next() {
        Some(version) if version.starts_with("HTTP/1.") => {}
        _ => return Err(ProtocolError::Malformed("unsupported HTTP version")),
    }

    let (path, query) = parse_target(target);

    // Headers: only Content-Length matters to the core.
    let mut content_length = 0usize;
    loop {
        let line = read_line(&mut reader).await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| ProtocolError::Malformed("bad Content-Length"))?;
            }
        }
    }

    if content_length > MAX_BODY_SIZE {
        return Err(ProtocolError::BodyTooLarge {
            size: content_length,
        });
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::Io(e)
            }
        })?;
    }

    Ok(Request {
        method,
        path,
        query,
        body,
    })
}

/// Read a request with a timeout.
pub async fn read_request_timeout<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    timeout: std::time::Duration,
) -> Result<Request, ProtocolError> {
    tokio::time::timeout(timeout, read_request(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Serialize and write a response; the server closes after every reply.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nConnection: close\r\n",
        response.status,
        status_text(response.status)
    );
    if response.status != 204 {
        head.push_str("Content-Type: application/json\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    }
    head.push_str("\r\n");

    writer.write_all(head.as_bytes()).await?;
    if response.status != 204 {
        writer.write_all(response.body.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Write a response with a timeout.
pub async fn write_response_timeout<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    tokio::time::timeout(timeout, write_response(writer, response))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

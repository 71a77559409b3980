//! HTTP response helpers.

use anyhow::Result;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::sync::ErrorResponse;

pub const HTML: &str = "text/html; charset=utf-8";
pub const JSON: &str = "application/json";
pub const PLAIN: &str = "text/plain; charset=utf-8";

pub fn send_html(request: Request, html: String) -> Result<()> {
    send_body(request, 200, HTML, html.into_bytes())
}

pub fn send_json<T: Serialize>(request: Request, status: u16, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    send_body(request, status, JSON, body)
}

/// JSON `{error}` body, the shape clients decode failures from.
pub fn send_error(request: Request, status: u16, message: impl Into<String>) -> Result<()> {
    let body = ErrorResponse {
        error: message.into(),
    };
    send_json(request, status, &body)
}

pub fn send_text(request: Request, status: u16, text: &str) -> Result<()> {
    send_body(request, status, PLAIN, text.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_text(request, 503, "503 Service Unavailable")
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
        request.respond(response)?;
        return Ok(());
    }
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    // both sides are static ASCII
    Header::from_bytes(key, value).unwrap_or_else(|()| unreachable!("invalid header {key}"))
}

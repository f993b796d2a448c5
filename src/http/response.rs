//! HTTP response building module
//!
//! Builders for status responses over the primary shape. Error paths still
//! carry the headers a client needs, e.g. `Content-Range` on a 416.

use crate::engine::Response;
use crate::error::Error;
use crate::http::range::unsatisfied_content_range;
use hyper::StatusCode;

/// Canonical reason phrase for a status code
pub fn reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Plain text status response, e.g. `404 Not Found`
pub fn build_status_response(status: u16) -> Response {
    Response::new(status)
        .with_header("Content-Type", "text/plain; charset=utf-8")
        .with_body(format!("{status} {}", reason(status)))
}

/// Response for an error; internal causes are not exposed to the client
pub fn build_error_response(err: &Error) -> Response {
    match err {
        Error::UnsatisfiableRange { total } => build_416_response(*total),
        Error::MethodNotAllowed(_) => build_405_response(),
        Error::Status { code, message } => Response::new(*code)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(message.clone()),
        _ => build_status_response(err.status()),
    }
}

/// Build 416 Range Not Satisfiable response, no body
pub fn build_416_response(total: u64) -> Response {
    Response::new(416).with_header("Content-Range", unsatisfied_content_range(total))
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response {
    build_status_response(405).with_header("Allow", "GET, HEAD")
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response {
    let resp = Response::new(200)
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_header("Content-Length", content.len().to_string());
    if is_head {
        resp
    } else {
        resp.with_body(content)
    }
}

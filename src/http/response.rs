//! Response construction helpers.
//!
//! # Responsibilities
//! - Build the plain-text error answers shared by routing and built-ins
//! - Map stored entries onto responses with the configured header set
//!
//! # Design Decisions
//! - Error bodies are plain text terminated by a newline
//! - Configured headers are only applied to served messages, never to errors

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

use crate::registry::{HeaderSet, ResponseEntry};

/// Plain-text response with a trailing newline.
pub fn plain_text(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(format!("{message}\n")));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Stored body verbatim, stored status, every configured header.
pub fn stored_message(entry: ResponseEntry, headers: &HeaderSet) -> Response {
    let status = entry.status();
    let mut response = Response::new(Body::from(entry.into_body()));
    *response.status_mut() = status;
    headers.apply(response.headers_mut());
    response
}

/// Fixed acknowledgement returned by a successful update.
pub fn success() -> Response {
    let mut response = Response::new(Body::from("success"));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

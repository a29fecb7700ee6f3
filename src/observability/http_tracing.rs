//! # HTTP Request Tracing Middleware
//!
//! Wraps every API request in a `request_span!` and logs its outcome.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;

/// Axum middleware recording method, path, status and latency per request.
pub async fn trace_http_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = crate::request_span!(method, path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    span.record("status", status);

    let _guard = span.enter();
    if status >= 500 {
        tracing::error!(status, elapsed_ms, "Request failed");
    } else if status >= 400 {
        tracing::warn!(status, elapsed_ms, "Request rejected");
    } else {
        tracing::debug!(status, elapsed_ms, "Request completed");
    }

    response
}

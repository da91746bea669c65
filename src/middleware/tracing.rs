//! Request tracing middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const REQUEST_ID: &str = "x-request-id";

/// Log every request inside a span tagged with a request id
///
/// An incoming `x-request-id` is reused so ids line up across services; the
/// id is echoed back on the response either way.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!("request", request_id = %request_id, method = %method, path = %path);

    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| {
        if response.status().is_server_error() {
            tracing::error!(status, duration_ms, "Request failed");
        } else if response.status().is_client_error() {
            tracing::warn!(status, duration_ms, "Request rejected");
        } else {
            tracing::info!(status, duration_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID), value);
    }

    response
}

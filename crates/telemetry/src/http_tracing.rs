use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::correlation::{CorrelationId, X_CORRELATION_ID};

/// Axum middleware: one span per request, a completion log line with
/// status and latency, and the correlation ID echoed on the response.
pub async fn trace_http_request(mut req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let correlation_id = CorrelationId::from_headers(req.headers());
    req.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        correlation_id = %correlation_id,
    );

    let mut response = next.run(req).instrument(span.clone()).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| match status {
        500..=599 => error!(status, latency_ms, "request failed"),
        400..=499 => warn!(status, latency_ms, "request rejected"),
        _ => info!(status, latency_ms, "request served"),
    });

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }

    response
}

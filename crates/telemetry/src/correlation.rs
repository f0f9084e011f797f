use axum::http::HeaderMap;
use std::fmt;
use uuid::Uuid;

pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Accepted when the caller sends no `x-correlation-id`
pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_CORRELATION_ID_LEN: usize = 128;

/// Request-scoped identifier, available to handlers as an extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Take the caller's id when it is usable as a response header value,
    /// otherwise mint a new one
    pub fn from_headers(headers: &HeaderMap) -> Self {
        [X_CORRELATION_ID, X_REQUEST_ID]
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|id| is_acceptable(id))
            .map(|id| Self(id.to_string()))
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_acceptable(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_CORRELATION_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Logging, request correlation and metrics for the thumbnail service

pub mod correlation;
pub mod http_tracing;
pub mod logging;
pub mod metrics;

// Re-export commonly used items
pub use correlation::{CorrelationId, X_CORRELATION_ID, X_REQUEST_ID};
pub use http_tracing::trace_http_request;
pub use logging::{init_structured_logging, init_with_service, LogConfig, LogFormat};

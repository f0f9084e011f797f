use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{fit::FitError, thumbnail::ValidationError};
use std::fmt::{self, Display};
use thiserror::Error;

/// Cache store failure other than "not present"
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// A readable URL for the source video could not be produced
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("video not found: {0}")]
    NotFound(String),
    #[error("invalid video key: {0}")]
    InvalidKey(String),
    #[error("failed to sign source url: {0}")]
    Signing(String),
}

/// Decoder or render pipeline failure.
///
/// Variants carry strings rather than source errors so a single result can
/// be handed to every caller waiting on the same generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("failed to probe source: {0}")]
    Probe(String),
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error(transparent)]
    Geometry(#[from] FitError),
    #[error("failed to start decoder: {0}")]
    Spawn(String),
    /// `stderr` is kept for operator logs only
    #[error("decoder exited with {status}")]
    Decoder { status: String, stderr: String },
    #[error("decoder produced no image data")]
    EmptyOutput,
    #[error("temporary storage error: {0}")]
    TempStorage(String),
    #[error("decoder i/o error: {0}")]
    Io(String),
    #[error("generation task panicked")]
    Panicked,
    #[error("generation scheduler is not accepting work")]
    Rejected,
}

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("cache lookup failed: {0}")]
    CacheLookup(CacheError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // String bodies are served as text/plain
        (self.status, self.message).into_response()
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::bad_request(value.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self::internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err = ApiError::from(ValidationError::BadFit("bogus".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("crop, clip, scale, fill"));
    }

    #[test]
    fn test_decoder_stderr_not_exposed() {
        let err = ApiError::from(ServiceError::Generation(GenerationError::Decoder {
            status: "exit status: 1".to_string(),
            stderr: "/secret/path: Invalid data found".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("exit status: 1"));
        assert!(!err.message().contains("/secret/path"));
    }

    #[test]
    fn test_cache_lookup_failure_is_internal() {
        let err = ApiError::from(ServiceError::CacheLookup(CacheError::Backend(
            "timeout".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

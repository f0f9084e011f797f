use axum::{
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, VARY},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use common::cache_key::CacheKey;
use std::{sync::Arc, time::Instant};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::{
    cache::{CacheStore, CachedArtifact},
    engine::RenderedImage,
    service::Thumbnail,
};

/// Thumbnails never change for a given URL
pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000";

/// Reports whether the response came from the cache
pub const X_THUMBNAIL_CACHE: &str = "x-thumbnail-cache";

/// When a generated thumbnail is written back to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheWriteMode {
    /// Spawned; the response does not wait for it
    #[default]
    Background,
    /// Awaited before the response is sent
    Inline,
}

impl CacheWriteMode {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "inline" | "sync" => Self::Inline,
            _ => Self::Background,
        }
    }
}

/// Best-effort write-back of generated thumbnails
#[derive(Clone)]
pub struct CachePublisher {
    cache: Arc<dyn CacheStore>,
    mode: CacheWriteMode,
}

impl CachePublisher {
    pub fn new(cache: Arc<dyn CacheStore>, mode: CacheWriteMode) -> Self {
        Self { cache, mode }
    }

    pub fn mode(&self) -> CacheWriteMode {
        self.mode
    }

    /// Store `image` under `key`. Failures are logged and counted, never returned.
    pub async fn store(&self, key: &CacheKey, image: &RenderedImage) {
        let artifact = CachedArtifact::new(image.bytes.clone(), image.content_type());
        let cache = self.cache.clone();
        let key = key.clone();

        match self.mode {
            CacheWriteMode::Inline => write_back(cache, key, artifact).await,
            CacheWriteMode::Background => {
                tokio::spawn(write_back(cache, key, artifact));
            }
        }
    }
}

async fn write_back(cache: Arc<dyn CacheStore>, key: CacheKey, artifact: CachedArtifact) {
    let start = Instant::now();
    let size = artifact.size();

    match cache.put(&key, artifact).await {
        Ok(()) => {
            metrics::THUMBNAIL_CACHE_WRITES
                .with_label_values(&["success"])
                .inc();
            debug!(
                cache_key = %key,
                size_bytes = size,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "thumbnail cached"
            );
        }
        Err(err) => {
            metrics::THUMBNAIL_CACHE_WRITES
                .with_label_values(&["failure"])
                .inc();
            warn!(cache_key = %key, error = %err, "failed to cache thumbnail");
        }
    }
}

/// Success response for a thumbnail, from the cache or freshly generated
pub fn thumbnail_response(thumbnail: Thumbnail, vary_accept: bool) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&thumbnail.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_IMMUTABLE));
    if vary_accept {
        headers.insert(VARY, HeaderValue::from_static("Accept"));
    }
    headers.insert(
        HeaderName::from_static(X_THUMBNAIL_CACHE),
        HeaderValue::from_static(thumbnail.origin.as_str()),
    );

    (StatusCode::OK, headers, thumbnail.bytes).into_response()
}

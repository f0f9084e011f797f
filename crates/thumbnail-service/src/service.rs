use bytes::Bytes;
use common::{
    cache_key::{derive_key, CacheKey},
    thumbnail::ThumbnailRequest,
};
use futures::FutureExt;
use std::{sync::Arc, time::Instant};
use telemetry::metrics;
use tracing::{error, info, warn};

use crate::{
    cache::CacheStore,
    coalesce::InFlight,
    engine::{FrameRenderer, RenderJob, RenderedImage},
    error::ServiceError,
    publisher::CachePublisher,
    scheduler::{GenerationScheduler, GenerationTask},
    source::SourceResolver,
};

/// Where a served thumbnail came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Generated,
}

impl Origin {
    /// Value of the `x-thumbnail-cache` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Cache => "hit",
            Origin::Generated => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Bytes,
    pub content_type: String,
    pub origin: Origin,
}

/// Cache lookup, then source resolution, bounded generation and write-back
#[derive(Clone)]
pub struct ThumbnailService {
    cache: Arc<dyn CacheStore>,
    resolver: Arc<dyn SourceResolver>,
    renderer: Arc<dyn FrameRenderer>,
    scheduler: GenerationScheduler,
    publisher: CachePublisher,
    in_flight: Option<InFlight<Result<RenderedImage, ServiceError>>>,
}

impl ThumbnailService {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        resolver: Arc<dyn SourceResolver>,
        renderer: Arc<dyn FrameRenderer>,
        scheduler: GenerationScheduler,
        publisher: CachePublisher,
    ) -> Self {
        Self {
            cache,
            resolver,
            renderer,
            scheduler,
            publisher,
            in_flight: None,
        }
    }

    /// Share one generation between concurrent identical requests
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(InFlight::new);
        self
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub async fn thumbnail(&self, request: &ThumbnailRequest) -> Result<Thumbnail, ServiceError> {
        let key = derive_key(request);

        match self.cache.get(&key).await {
            Ok(Some(artifact)) => {
                metrics::THUMBNAIL_CACHE_LOOKUPS
                    .with_label_values(&["hit"])
                    .inc();
                info!(key = %request.video_key(), cache_key = %key, "serving cached thumbnail");
                return Ok(Thumbnail {
                    bytes: artifact.bytes,
                    content_type: artifact.content_type,
                    origin: Origin::Cache,
                });
            }
            Ok(None) => {
                metrics::THUMBNAIL_CACHE_LOOKUPS
                    .with_label_values(&["miss"])
                    .inc();
            }
            Err(err) => {
                metrics::THUMBNAIL_CACHE_LOOKUPS
                    .with_label_values(&["error"])
                    .inc();
                error!(cache_key = %key, error = %err, "cache lookup failed");
                return Err(ServiceError::CacheLookup(err));
            }
        }

        let start = Instant::now();
        let generated = match &self.in_flight {
            Some(in_flight) => {
                let this = self.clone();
                let request = request.clone();
                let owned_key = key.clone();
                in_flight
                    .run(&key, move || this.generate(request, owned_key).boxed())
                    .await
            }
            None => self.clone().generate(request.clone(), key.clone()).await,
        };

        match generated {
            Ok(image) => {
                info!(
                    key = %request.video_key(),
                    cache_key = %key,
                    time = %request.time_expression(),
                    width = request.width(),
                    height = request.height(),
                    fit = %request.fit(),
                    encoding = %request.encoding(),
                    size_bytes = image.bytes.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "thumbnail generated"
                );
                Ok(Thumbnail {
                    content_type: image.content_type().to_string(),
                    bytes: image.bytes,
                    origin: Origin::Generated,
                })
            }
            Err(err) => {
                warn!(
                    key = %request.video_key(),
                    cache_key = %key,
                    error = %err,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "thumbnail generation failed"
                );
                Err(err)
            }
        }
    }

    async fn generate(
        self,
        request: ThumbnailRequest,
        key: CacheKey,
    ) -> Result<RenderedImage, ServiceError> {
        let source_url = self.resolver.resolve_read_url(request.video_key()).await?;
        let job = RenderJob::for_request(&request, source_url);

        let renderer = self.renderer.clone();
        let task = GenerationTask::new(key.to_string(), async move { renderer.render(job).await });
        let image = self.scheduler.submit(task).await.into_result()?;

        self.publisher.store(&key, &image).await;
        Ok(image)
    }
}

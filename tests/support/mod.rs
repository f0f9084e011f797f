//! Fake collaborators for driving the thumbnail pipeline without storage or ffmpeg

#![allow(dead_code)]

use async_trait::async_trait;
use common::cache_key::CacheKey;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use thumbnail_service::{
    api,
    cache::{CacheStore, CachedArtifact, MemoryCacheStore},
    engine::{FrameRenderer, RenderJob, RenderedImage},
    error::{CacheError, GenerationError, ResolveError},
    publisher::{CachePublisher, CacheWriteMode},
    scheduler::GenerationScheduler,
    source::SourceResolver,
    AppState, ThumbnailService,
};

/// Signs every key except `videos/missing.mp4`
pub struct StaticResolver;

#[async_trait]
impl SourceResolver for StaticResolver {
    async fn resolve_read_url(&self, video_key: &str) -> Result<String, ResolveError> {
        if video_key == "videos/missing.mp4" {
            return Err(ResolveError::NotFound(video_key.to_string()));
        }
        Ok(format!("https://videos.example/{}?X-Amz-Signature=test", video_key))
    }
}

#[derive(Clone)]
pub enum Script {
    Image(&'static [u8]),
    Fail(GenerationError),
}

/// Renderer that returns a fixed outcome and records what it was asked to do
pub struct ScriptedRenderer {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    jobs: std::sync::Mutex<Vec<RenderJob>>,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            jobs: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn image(bytes: &'static [u8]) -> Self {
        Self::new(Script::Image(bytes))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn jobs(&self) -> Vec<RenderJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameRenderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn render(&self, job: RenderJob) -> Result<RenderedImage, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Image(bytes) => Ok(RenderedImage::new(*bytes, job.encoding)),
            Script::Fail(err) => Err(err.clone()),
        }
    }
}

/// Reads from an inner memory store, refuses every write
pub struct ReadOnlyCache(pub MemoryCacheStore);

#[async_trait]
impl CacheStore for ReadOnlyCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedArtifact>, CacheError> {
        self.0.get(key).await
    }

    async fn put(&self, _key: &CacheKey, _artifact: CachedArtifact) -> Result<(), CacheError> {
        Err(CacheError::Backend("AccessDenied".to_string()))
    }
}

/// Every lookup fails with something other than not-found
pub struct UnreachableCache;

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedArtifact>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn put(&self, _key: &CacheKey, _artifact: CachedArtifact) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

pub struct Harness {
    pub cache: Arc<dyn CacheStore>,
    pub renderer: Arc<ScriptedRenderer>,
    pub max_concurrent: usize,
    pub avif_enabled: bool,
    pub coalesce: bool,
}

impl Harness {
    pub fn new(renderer: ScriptedRenderer) -> Self {
        Self {
            cache: Arc::new(MemoryCacheStore::default()),
            renderer: Arc::new(renderer),
            max_concurrent: 5,
            avif_enabled: true,
            coalesce: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn service(&self) -> ThumbnailService {
        ThumbnailService::new(
            self.cache.clone(),
            Arc::new(StaticResolver),
            self.renderer.clone(),
            GenerationScheduler::new(self.max_concurrent),
            // Inline so a follow-up request observes the write
            CachePublisher::new(self.cache.clone(), CacheWriteMode::Inline),
        )
        .with_coalescing(self.coalesce)
    }

    pub fn router(&self) -> axum::Router {
        api::create_router(AppState::new(self.service(), self.avif_enabled))
    }

    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router()).unwrap()
    }
}

pub const FAKE_JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0xff, 0xd9];

use anyhow::{Context, Result};
use std::sync::Arc;
use thumbnail_service::{
    api,
    cache::{CacheStore, MemoryCacheStore, S3CacheStore},
    config::{CacheBackend, ServiceConfig, SourceBackend},
    engine::{FfmpegRenderer, FrameRenderer},
    publisher::CachePublisher,
    s3::s3_client,
    scheduler::GenerationScheduler,
    source::{LocalSourceResolver, S3SourceResolver, SourceResolver},
    AppState, ThumbnailService,
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_with_service("thumbnail-service");

    let config = ServiceConfig::from_env()?;
    let bind_addr = config.bind_addr;

    let needs_s3 =
        config.cache_backend == CacheBackend::S3 || config.source_backend == SourceBackend::S3;
    let client = if needs_s3 {
        Some(s3_client(&config.s3).await)
    } else {
        None
    };

    let cache: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Memory => {
            info!(
                max_items = config.memory_cache.max_items,
                max_size_bytes = config.memory_cache.max_size_bytes,
                "using in-memory thumbnail cache"
            );
            Arc::new(MemoryCacheStore::new(config.memory_cache.clone()))
        }
        CacheBackend::S3 => {
            let bucket = config
                .cache_bucket
                .clone()
                .context("CACHE_BUCKET_NAME required for the s3 cache backend")?;
            let client = client.clone().context("s3 client not configured")?;
            info!(bucket = %bucket, prefix = %config.cache_prefix, "using s3 thumbnail cache");
            Arc::new(S3CacheStore::new(client, bucket, config.cache_prefix.clone()))
        }
    };

    let resolver: Arc<dyn SourceResolver> = match config.source_backend {
        SourceBackend::Local => {
            info!(root = %config.local_video_root.display(), "serving videos from local directory");
            Arc::new(LocalSourceResolver::new(config.local_video_root.clone()))
        }
        SourceBackend::S3 => {
            let bucket = config
                .video_bucket
                .clone()
                .context("VIDEO_BUCKET_NAME required for the s3 source backend")?;
            let client = client.clone().context("s3 client not configured")?;
            info!(bucket = %bucket, ttl_secs = config.signed_url_ttl.as_secs(), "using presigned s3 sources");
            Arc::new(S3SourceResolver::new(client, bucket, config.signed_url_ttl))
        }
    };

    let renderer: Arc<dyn FrameRenderer> = Arc::new(FfmpegRenderer::new(config.ffmpeg.clone()));
    let scheduler = GenerationScheduler::new(config.max_concurrent_generations);
    let publisher = CachePublisher::new(cache.clone(), config.cache_write_mode);

    let service = ThumbnailService::new(cache, resolver, renderer, scheduler.clone(), publisher)
        .with_coalescing(config.coalesce_requests);

    info!(
        renderer = service.renderer_name(),
        max_concurrent_generations = scheduler.limit(),
        avif_enabled = config.avif_enabled,
        cache_write_mode = ?config.cache_write_mode,
        coalesce_requests = config.coalesce_requests,
        "thumbnail pipeline ready"
    );

    let state = AppState::new(service, config.avif_enabled);
    let app = api::create_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(addr = %bind_addr, "thumbnail service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.close();
    info!("thumbnail service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

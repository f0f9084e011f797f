use anyhow::{bail, Context, Result};
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use crate::{
    cache::MemoryCacheConfig, engine::FfmpegConfig, publisher::CacheWriteMode,
    scheduler::DEFAULT_MAX_CONCURRENT_GENERATIONS,
};

#[derive(Clone, Debug, PartialEq)]
pub enum CacheBackend {
    S3,
    Memory,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceBackend {
    S3,
    Local,
}

/// Object store access shared by the cache and source buckets
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub max_concurrent_generations: usize,
    pub cache_backend: CacheBackend,
    pub source_backend: SourceBackend,
    pub s3: S3Settings,
    pub video_bucket: Option<String>,
    pub cache_bucket: Option<String>,
    pub cache_prefix: String,
    pub signed_url_ttl: Duration,
    pub local_video_root: PathBuf,
    pub memory_cache: MemoryCacheConfig,
    pub ffmpeg: FfmpegConfig,
    pub avif_enabled: bool,
    pub cache_write_mode: CacheWriteMode,
    pub coalesce_requests: bool,
}

const MIB: usize = 1024 * 1024;

fn mib_to_bytes(mib: usize) -> usize {
    mib.saturating_mul(MIB)
}

impl S3Settings {
    /// `S3_*` variables, with the R2 names older deployments set
    pub fn from_env() -> Self {
        Self {
            endpoint: var_any(&["S3_ENDPOINT", "R2_ENDPOINT"])
                .or_else(|| Some("http://localhost:9000".to_string())),
            region: var_any(&["S3_REGION", "R2_REGION"]).unwrap_or_else(|| "auto".to_string()),
            access_key: var_any(&["S3_ACCESS_KEY", "R2_ACCESS_KEY", "R2_ACCESS_KEY_ID"]),
            secret_key: var_any(&["S3_SECRET_KEY", "R2_SECRET_KEY", "R2_SECRET_ACCESS_KEY"]),
        }
    }
}

/// First set, non-empty variable among `names`
fn var_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind = env::var("THUMBNAIL_ADDR").unwrap_or_else(|_| {
            let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });
        let bind_addr: SocketAddr = bind.parse().context("invalid THUMBNAIL_ADDR or PORT")?;

        let max_concurrent_generations =
            parse_var("MAX_CONCURRENT_GENERATIONS", DEFAULT_MAX_CONCURRENT_GENERATIONS).max(1);

        let cache_backend = match env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            "s3" | "r2" => CacheBackend::S3,
            other => bail!("unknown CACHE_BACKEND '{}', expected s3 or memory", other),
        };

        let source_backend = match env::var("SOURCE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => SourceBackend::Local,
            "s3" | "r2" => SourceBackend::S3,
            other => bail!("unknown SOURCE_BACKEND '{}', expected s3 or local", other),
        };

        let s3 = S3Settings::from_env();

        let video_bucket = var_any(&["VIDEO_BUCKET_NAME"]);
        if source_backend == SourceBackend::S3 && video_bucket.is_none() {
            bail!("VIDEO_BUCKET_NAME required for the s3 source backend");
        }

        let cache_bucket = var_any(&["CACHE_BUCKET_NAME"]);
        if cache_backend == CacheBackend::S3 && cache_bucket.is_none() {
            bail!("CACHE_BUCKET_NAME required for the s3 cache backend");
        }

        let defaults = MemoryCacheConfig::default();
        let memory_cache = MemoryCacheConfig {
            max_items: parse_var("MEMORY_CACHE_MAX_ITEMS", defaults.max_items),
            max_size_bytes: mib_to_bytes(parse_var(
                "MEMORY_CACHE_MAX_SIZE_MB",
                defaults.max_size_bytes / MIB,
            )),
        };

        let ffmpeg_defaults = FfmpegConfig::default();
        let ffmpeg = FfmpegConfig {
            ffmpeg_path: env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(ffmpeg_defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(ffmpeg_defaults.ffprobe_path),
            jpeg_quality: parse_var("JPEG_QUALITY", ffmpeg_defaults.jpeg_quality),
            avif_crf: parse_var("AVIF_CRF", ffmpeg_defaults.avif_crf),
        };

        Ok(Self {
            bind_addr,
            max_concurrent_generations,
            cache_backend,
            source_backend,
            s3,
            video_bucket,
            cache_bucket,
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or_default(),
            signed_url_ttl: Duration::from_secs(parse_var("SIGNED_URL_TTL_SECS", 3600u64).max(1)),
            local_video_root: env::var("LOCAL_VIDEO_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/videos")),
            memory_cache,
            ffmpeg,
            avif_enabled: parse_var("AVIF_ENABLED", true),
            cache_write_mode: CacheWriteMode::parse(
                &env::var("CACHE_WRITE_MODE").unwrap_or_default(),
            ),
            coalesce_requests: parse_var("COALESCE_REQUESTS", false),
        })
    }
}

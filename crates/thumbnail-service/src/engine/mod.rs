//! Frame extraction backends.
//!
//! A [`FrameRenderer`] seeks a source, decodes one frame, applies the fit
//! plan from [`common::fit`] and encodes the result. One implementation is
//! selected at startup; the rest of the service only sees the trait.
//!
//! Out-of-range offsets are clamped by [`clamp_offset`]: a request at or past
//! the end of a source with a known, non-zero duration is served from the
//! midpoint of the video. Offset zero is never clamped.

pub mod ffmpeg;
pub mod probe;

use async_trait::async_trait;
use bytes::Bytes;
use common::{
    fit::FrameSize,
    thumbnail::{FitMode, OutputEncoding, ThumbnailRequest},
};
use std::time::Duration;

use crate::error::GenerationError;

pub use ffmpeg::{FfmpegConfig, FfmpegRenderer};

/// One encoded still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Bytes,
    pub encoding: OutputEncoding,
}

impl RenderedImage {
    pub fn new(bytes: impl Into<Bytes>, encoding: OutputEncoding) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.encoding.content_type()
    }
}

/// Everything a renderer needs to produce one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Time-limited URL; used for this job only
    pub source_url: String,
    pub time_offset: Duration,
    pub width: u32,
    pub height: u32,
    pub fit: FitMode,
    pub encoding: OutputEncoding,
}

impl RenderJob {
    pub fn for_request(request: &ThumbnailRequest, source_url: String) -> Self {
        Self {
            source_url,
            time_offset: request.time_offset(),
            width: request.width(),
            height: request.height(),
            fit: request.fit(),
            encoding: request.encoding(),
        }
    }

    pub fn target(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

#[async_trait]
pub trait FrameRenderer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn render(&self, job: RenderJob) -> Result<RenderedImage, GenerationError>;
}

/// Seek position actually used for a requested offset
pub fn clamp_offset(requested: Duration, duration: Option<Duration>) -> Duration {
    match duration {
        Some(duration) if !duration.is_zero() && requested >= duration => duration / 2,
        _ => requested,
    }
}

//! Thumbnail request types and parameter normalization
//!
//! Raw query parameters are turned into a [`ThumbnailRequest`] exactly once,
//! before anything derives a cache key or schedules work from them. A
//! `ThumbnailRequest` can only be obtained through [`normalize`], so holding
//! one means every field has been validated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::timespec::{parse_time_expression, TimeSpecError};

pub const DEFAULT_TIME: &str = "0s";
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FIT: FitMode = FitMode::Crop;

/// Largest accepted output edge in pixels
pub const MAX_DIMENSION: u32 = 8192;

/// Object-store keys are limited to 1024 bytes
pub const MAX_VIDEO_KEY_LENGTH: usize = 1024;

/// How the source frame's aspect ratio is reconciled with the output size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the output exactly, cropping whatever overflows
    Crop,
    /// Contain the whole frame; margins are left transparent
    Clip,
    /// Stretch to the output size, ignoring aspect ratio
    Scale,
    /// Contain the whole frame; margins are painted black
    Fill,
}

impl FitMode {
    pub const ALL: [FitMode; 4] = [FitMode::Crop, FitMode::Clip, FitMode::Scale, FitMode::Fill];

    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Crop => "crop",
            FitMode::Clip => "clip",
            FitMode::Scale => "scale",
            FitMode::Fill => "fill",
        }
    }

    /// Comma separated list of every accepted value
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(FitMode::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ValidationError::BadFit(s.to_string()))
    }
}

/// Output image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    /// Baseline: lossy, no alpha, fast to produce
    Jpeg,
    /// Negotiated: smaller output, slower to encode
    Avif,
}

impl OutputEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputEncoding::Jpeg => "jpeg",
            OutputEncoding::Avif => "avif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputEncoding::Jpeg => "image/jpeg",
            OutputEncoding::Avif => "image/avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputEncoding::Jpeg => "jpg",
            OutputEncoding::Avif => "avif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(OutputEncoding::Jpeg),
            "avif" => Some(OutputEncoding::Avif),
            _ => None,
        }
    }

    /// Pick the encoding from the caller's `Accept` header.
    ///
    /// AVIF is chosen only when the caller advertises `image/avif` with a
    /// non-zero `q` and the deployment has it enabled; everything else gets JPEG.
    pub fn negotiate(accept: Option<&str>, avif_enabled: bool) -> Self {
        let accepts_avif = accept
            .map(|value| value.split(',').any(accepts_avif_range))
            .unwrap_or(false);

        if avif_enabled && accepts_avif {
            OutputEncoding::Avif
        } else {
            OutputEncoding::Jpeg
        }
    }
}

fn accepts_avif_range(range: &str) -> bool {
    let mut parts = range.split(';');
    let media_type = parts.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("image/avif") {
        return false;
    }
    // `q=0` means "not acceptable"
    !parts.any(|param| match param.trim().split_once('=') {
        Some((name, value)) if name.trim().eq_ignore_ascii_case("q") => {
            value.trim().parse::<f32>().map_or(false, |q| q <= 0.0)
        }
        _ => false,
    })
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters exactly as the caller sent them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawThumbnailParams {
    pub key: Option<String>,
    pub time: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub fit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please add a ?key=videos/video.mp4 parameter")]
    MissingKey,
    #[error("key exceeds maximum length of {} bytes", MAX_VIDEO_KEY_LENGTH)]
    KeyTooLong,
    #[error("Invalid time parameter: {0}")]
    BadTime(TimeSpecError),
    #[error("Invalid height or width parameter")]
    BadDimensions,
    #[error("Invalid fit parameter '{0}'. Must be one of: {}", FitMode::valid_values())]
    BadFit(String),
}

/// A fully validated thumbnail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    video_key: String,
    time_expression: String,
    time_offset: Duration,
    width: u32,
    height: u32,
    fit: FitMode,
    encoding: OutputEncoding,
}

impl ThumbnailRequest {
    pub fn video_key(&self) -> &str {
        &self.video_key
    }

    /// The time parameter as the caller spelled it
    pub fn time_expression(&self) -> &str {
        &self.time_expression
    }

    pub fn time_offset(&self) -> Duration {
        self.time_offset
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fit(&self) -> FitMode {
        self.fit
    }

    pub fn encoding(&self) -> OutputEncoding {
        self.encoding
    }
}

/// Validate raw parameters into a [`ThumbnailRequest`].
///
/// Empty parameters other than `key` fall back to their defaults.
pub fn normalize(
    params: &RawThumbnailParams,
    encoding: OutputEncoding,
) -> Result<ThumbnailRequest, ValidationError> {
    let video_key = match params.key.as_deref() {
        Some(key) if !key.trim().is_empty() => key,
        _ => return Err(ValidationError::MissingKey),
    };
    if video_key.len() > MAX_VIDEO_KEY_LENGTH {
        return Err(ValidationError::KeyTooLong);
    }

    let time_expression = non_empty(params.time.as_deref()).unwrap_or(DEFAULT_TIME);
    let time_offset = parse_time_expression(time_expression).map_err(ValidationError::BadTime)?;

    let width = parse_dimension(params.width.as_deref(), DEFAULT_WIDTH)?;
    let height = parse_dimension(params.height.as_deref(), DEFAULT_HEIGHT)?;

    let fit = match non_empty(params.fit.as_deref()) {
        Some(value) => value.parse()?,
        None => DEFAULT_FIT,
    };

    Ok(ThumbnailRequest {
        video_key: video_key.to_string(),
        time_expression: time_expression.to_string(),
        time_offset,
        width,
        height,
        fit,
        encoding,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn parse_dimension(value: Option<&str>, default: u32) -> Result<u32, ValidationError> {
    let Some(raw) = non_empty(value) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 && n <= MAX_DIMENSION => Ok(n),
        _ => Err(ValidationError::BadDimensions),
    }
}

use common::fit::FrameSize;
use serde::Deserialize;
use std::{path::Path, process::Stdio, time::Duration};
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::GenerationError;

/// Geometry and length of a source video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Display size of the first video stream: rotation applied, square pixels
    pub frame: FrameSize,
    /// Size of the frame ffmpeg hands to the filter graph after autorotation.
    /// Differs from `frame` only for non-square sample aspect ratios.
    pub decoded: FrameSize,
    /// `None` for streams that report no duration
    pub duration: Option<Duration>,
}

impl SourceInfo {
    /// Filter that resamples an anamorphic frame to `frame` before fitting
    pub fn square_pixels_filter(&self) -> Option<String> {
        (self.decoded != self.frame).then(|| {
            format!("scale={}:{},setsar=1", self.frame.width, self.frame.height)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    sample_aspect_ratio: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display matrix rotation, falling back to the legacy `rotate` tag
    fn rotation_degrees(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .map(|deg: f64| deg.round() as i64)
            .unwrap_or(0)
    }

    /// `num:den`, treating missing, `N/A` and `0:1` as square
    fn sample_aspect(&self) -> (u32, u32) {
        self.sample_aspect_ratio
            .as_deref()
            .and_then(|sar| sar.split_once(':'))
            .and_then(|(n, d)| Some((n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?)))
            .filter(|&(n, d)| n > 0 && d > 0)
            .unwrap_or((1, 1))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Run ffprobe once for the first video stream's size and the duration
pub async fn probe_source(ffprobe: &Path, source_url: &str) -> Result<SourceInfo, GenerationError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,duration,sample_aspect_ratio:stream_side_data=rotation:stream_tags=rotate:format=duration",
            "-of",
            "json",
        ])
        .arg(source_url)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| GenerationError::Spawn(format!("{}: {}", ffprobe.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(status = ?output.status, stderr = %stderr.trim(), "ffprobe failed");
        return Err(GenerationError::Probe(format!("ffprobe exited with {}", output.status)));
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(frame = %info.frame, duration = ?info.duration, "probed source");
    Ok(info)
}

pub fn parse_probe_output(stdout: &[u8]) -> Result<SourceInfo, GenerationError> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| GenerationError::Probe(format!("unexpected ffprobe output: {}", e)))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| GenerationError::Probe("source has no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(GenerationError::Probe(
                "video stream reports no dimensions".to_string(),
            ))
        }
    };

    // Container duration first; some containers only carry it per stream
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(stream.duration.as_deref()));

    let (num, den) = stream.sample_aspect();
    let display_width = ((width as f64 * num as f64 / den as f64).round() as u32).max(1);

    // ffmpeg autorotates before the filter graph runs
    let quarter_turn = stream.rotation_degrees().rem_euclid(180) == 90;
    let (decoded, frame) = if quarter_turn {
        (
            FrameSize::new(height, width),
            FrameSize::new(height, display_width),
        )
    } else {
        (
            FrameSize::new(width, height),
            FrameSize::new(display_width, height),
        )
    };

    Ok(SourceInfo {
        frame,
        decoded,
        duration,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

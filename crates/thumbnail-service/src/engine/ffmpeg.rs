use async_trait::async_trait;
use common::{
    fit::{plan_fit, Background, PixelPlan},
    thumbnail::OutputEncoding,
    validation::validate_source_uri,
};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{
    clamp_offset,
    probe::{probe_source, SourceInfo},
    FrameRenderer, RenderJob, RenderedImage,
};
use crate::error::GenerationError;

const AVIF_FILE_NAME: &str = "frame.avif";

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// mjpeg `-q:v`, 2 (best) to 31
    pub jpeg_quality: u8,
    /// libaom `-crf`, 0 (lossless) to 63
    pub avif_crf: u8,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            jpeg_quality: 3,
            avif_crf: 30,
        }
    }
}

/// Subprocess backend: one ffprobe and one ffmpeg run per job
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    config: FfmpegConfig,
}

impl FfmpegRenderer {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    fn decode_args(&self, offset: Duration, source_url: &str, graph: &str) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", offset.as_secs_f64()),
            "-i".to_string(),
            source_url.to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-filter:v".to_string(),
            graph.to_string(),
        ]
    }

    fn jpeg_args(&self) -> Vec<String> {
        vec![
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "mjpeg".to_string(),
            "-q:v".to_string(),
            self.config.jpeg_quality.clamp(2, 31).to_string(),
            "-".to_string(),
        ]
    }

    fn avif_args(&self, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-c:v".to_string(),
            "libaom-av1".to_string(),
            "-crf".to_string(),
            self.config.avif_crf.min(63).to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-f".to_string(),
            "avif".to_string(),
            output.display().to_string(),
        ]
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, GenerationError> {
        debug!(args = ?args, "spawning ffmpeg");

        let output = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                GenerationError::Spawn(format!("{}: {}", self.config.ffmpeg_path.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = ?output.status, stderr = %stderr, "ffmpeg failed");
            return Err(GenerationError::Decoder {
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }

    async fn encode_jpeg(&self, mut args: Vec<String>) -> Result<Vec<u8>, GenerationError> {
        args.extend(self.jpeg_args());
        self.run(&args).await
    }

    /// The AVIF muxer needs a seekable output, so it writes to a scratch
    /// directory that is removed when this function returns.
    async fn encode_avif(&self, mut args: Vec<String>) -> Result<Vec<u8>, GenerationError> {
        let scratch = tempfile::Builder::new()
            .prefix("thumbnail-")
            .tempdir()
            .map_err(|e| GenerationError::TempStorage(e.to_string()))?;
        let output = scratch.path().join(AVIF_FILE_NAME);

        args.extend(self.avif_args(&output));
        self.run(&args).await?;

        match tokio::fs::read(&output).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GenerationError::EmptyOutput),
            Err(e) => Err(GenerationError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl FrameRenderer for FfmpegRenderer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn render(&self, job: RenderJob) -> Result<RenderedImage, GenerationError> {
        validate_source_uri(&job.source_url)
            .map_err(|e| GenerationError::InvalidSource(e.to_string()))?;

        let start = Instant::now();
        let source = probe_source(&self.config.ffprobe_path, &job.source_url).await?;

        let offset = clamp_offset(job.time_offset, source.duration);
        if offset != job.time_offset {
            info!(
                requested_ms = job.time_offset.as_millis() as u64,
                duration_ms = source.duration.map(|d| d.as_millis() as u64),
                seek_ms = offset.as_millis() as u64,
                "requested time is past the end of the video, using midpoint"
            );
        }

        let plan = plan_fit(job.fit, source.frame, job.target())?;
        let graph = source_filter_graph(&source, &plan.to_pixels(source.frame));
        let args = self.decode_args(offset, &job.source_url, &graph);

        let bytes = match job.encoding {
            OutputEncoding::Jpeg => self.encode_jpeg(args).await?,
            OutputEncoding::Avif => self.encode_avif(args).await?,
        };
        if bytes.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        debug!(
            source = %source.frame,
            target = %job.target(),
            fit = %job.fit,
            encoding = %job.encoding,
            filter = %graph,
            size_bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "frame rendered"
        );

        Ok(RenderedImage::new(bytes, job.encoding))
    }
}

/// Full graph for a probed source: square up anamorphic pixels, then fit
pub fn source_filter_graph(source: &SourceInfo, plan: &PixelPlan) -> String {
    match source.square_pixels_filter() {
        Some(prefix) => format!("{},{}", prefix, filter_graph(plan)),
        None => filter_graph(plan),
    }
}

/// ffmpeg `-filter:v` graph for a pixel plan
pub fn filter_graph(plan: &PixelPlan) -> String {
    let mut filters = Vec::with_capacity(4);

    if let Some(crop) = plan.crop {
        filters.push(format!(
            "crop={}:{}:{}:{}",
            crop.width, crop.height, crop.x, crop.y
        ));
    }

    filters.push(format!("scale={}:{}", plan.scaled.width, plan.scaled.height));

    if let Some(pad) = plan.pad {
        let color = match pad.background {
            Background::Transparent => "black@0",
            Background::Black | Background::None => "black",
        };
        filters.push(format!(
            "pad={}:{}:{}:{}:color={}",
            pad.canvas.width, pad.canvas.height, pad.x, pad.y, color
        ));
    }

    // scale mode changes the pixel aspect otherwise
    filters.push("setsar=1".to_string());

    filters.join(",")
}

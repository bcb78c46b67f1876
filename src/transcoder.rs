//! # Transcoder Module
//!
//! Questo modulo produce gli artifact video invocando FFmpeg come processo figlio.
//!
//! ## Responsabilità:
//! - `make_preview`: clip di anteprima a bassa risoluzione
//! - `make_upscale`: versione 4K del video completo
//! - Controllo exit status: status non-zero → `TranscodeError` con lo stderr del tool
//! - Timeout per encode: il processo viene ucciso allo scadere
//! - Analisi proprietà video con ffprobe (`probe`)
//!
//! ## Preview:
//! - Durata: 5 secondi
//! - Risoluzione: altezza 360, larghezza automatica (pari)
//! - Bitrate video: 800k, preset `ultrafast`
//! - Audio: rimosso
//!
//! ## Upscale:
//! - Risoluzione fissa 3840x2160
//! - Codec video: libx264, preset `ultrafast`, CRF 23
//! - Audio: copiato senza ricodifica
//!
//! ## Cancellazione:
//! I processi figli sono avviati con `kill_on_drop`: se il future dello stage
//! viene droppato (timeout, cancellazione del job) FFmpeg viene terminato.
//!
//! ## Esempio:
//! ```rust,ignore
//! let transcoder = FfmpegTranscoder::new(&config)?;
//! let preview = transcoder.make_preview(&source, workspace.artifact(ArtifactRole::Preview)).await?;
//! let info = transcoder.probe(preview.path()).await?;
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::args;
use crate::artifact::MediaArtifact;
use crate::config::Config;
use crate::error::TranscodeError;
use crate::job::Stage;
use crate::platform::PlatformCommands;
use crate::utils::{path_arg, tail_lines};

pub const PREVIEW_SECONDS: u32 = 5;
pub const PREVIEW_HEIGHT: u32 = 360;
pub const PREVIEW_VIDEO_BITRATE: &str = "800k";
pub const UPSCALE_WIDTH: u32 = 3840;
pub const UPSCALE_HEIGHT: u32 = 2160;
pub const UPSCALE_CODEC: &str = "libx264";
pub const UPSCALE_CRF: u8 = 23;
pub const ENCODER_PRESET: &str = "ultrafast";

/// Lines of encoder stderr kept in errors
const DIAGNOSTIC_LINES: usize = 20;

/// Produces preview and upscaled artifacts from a source file
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode the short low-resolution preview of `source` into `target`
    async fn make_preview(
        &self,
        source: &MediaArtifact,
        target: MediaArtifact,
    ) -> Result<MediaArtifact, TranscodeError>;

    /// Encode the full-length 4K version of `source` into `target`
    async fn make_upscale(
        &self,
        source: &MediaArtifact,
        target: MediaArtifact,
    ) -> Result<MediaArtifact, TranscodeError>;
}

/// Argument list for the preview encode
pub fn preview_args(input: &Path, output: &Path) -> Vec<String> {
    args![
        "-y",
        "-i", path_arg(input),
        "-t", PREVIEW_SECONDS,
        "-vf", format!("scale=-2:{}", PREVIEW_HEIGHT),
        "-b:v", PREVIEW_VIDEO_BITRATE,
        "-preset", ENCODER_PRESET,
        "-an",
        path_arg(output),
    ]
}

/// Argument list for the upscale encode
pub fn upscale_args(input: &Path, output: &Path) -> Vec<String> {
    args![
        "-y",
        "-i", path_arg(input),
        "-vf", format!("scale={}:{}", UPSCALE_WIDTH, UPSCALE_HEIGHT),
        "-c:v", UPSCALE_CODEC,
        "-preset", ENCODER_PRESET,
        "-crf", UPSCALE_CRF,
        "-c:a", "copy",
        path_arg(output),
    ]
}

/// FFmpeg-backed transcoder
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
    timeout: Duration,
}

impl FfmpegTranscoder {
    /// Resolve ffmpeg now so a missing tool fails at startup, not mid-job
    pub fn new(config: &Config) -> Result<Self, TranscodeError> {
        let ffmpeg = PlatformCommands::instance().resolve("ffmpeg", config.ffmpeg_path.as_deref())?;
        Ok(Self {
            ffmpeg,
            ffprobe: config.ffprobe_path.clone(),
            timeout: config.transcode_timeout(),
        })
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    async fn encode(
        &self,
        stage: Stage,
        args: Vec<String>,
        target: MediaArtifact,
    ) -> Result<MediaArtifact, TranscodeError> {
        debug!("Running {} encode: {} {}", stage, self.ffmpeg.display(), args.join(" "));
        let start_time = Instant::now();

        let child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                tool: path_arg(&self.ffmpeg),
                source,
            })?;

        // dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TranscodeError::Timeout {
                stage,
                timeout: self.timeout,
            })?
            .map_err(|source| TranscodeError::Spawn {
                tool: path_arg(&self.ffmpeg),
                source,
            })?;

        let elapsed = start_time.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "❌ {} encode failed after {:.1}s: {}",
                stage,
                elapsed.as_secs_f64(),
                tail_lines(&stderr, DIAGNOSTIC_LINES)
            );
            return Err(TranscodeError::failed(
                stage,
                output.status.code(),
                tail_lines(&stderr, DIAGNOSTIC_LINES),
            ));
        }

        if !tokio::fs::try_exists(target.path()).await.unwrap_or(false) {
            return Err(TranscodeError::MissingOutput(target.path().to_path_buf()));
        }

        info!("✅ {} encode completed in {:.1}s", stage, elapsed.as_secs_f64());
        Ok(target)
    }

    /// Get video information using ffprobe
    pub async fn probe(&self, video_path: &Path) -> Result<VideoInfo, TranscodeError> {
        let ffprobe = PlatformCommands::instance().resolve("ffprobe", self.ffprobe.as_deref())?;

        let output = Command::new(&ffprobe)
            .args(args![
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
                path_arg(video_path),
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                tool: path_arg(&ffprobe),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Probe(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        VideoInfo::from_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn make_preview(
        &self,
        source: &MediaArtifact,
        target: MediaArtifact,
    ) -> Result<MediaArtifact, TranscodeError> {
        let args = preview_args(source.path(), target.path());
        self.encode(Stage::Preview, args, target).await
    }

    async fn make_upscale(
        &self,
        source: &MediaArtifact,
        target: MediaArtifact,
    ) -> Result<MediaArtifact, TranscodeError> {
        let args = upscale_args(source.path(), target.path());
        self.encode(Stage::Upscale, args, target).await
    }
}

/// Video file information
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub has_audio: bool,
}

impl VideoInfo {
    /// Parse `ffprobe -print_format json -show_format -show_streams` output
    pub fn from_ffprobe_json(json: &str) -> Result<Self, TranscodeError> {
        let info: serde_json::Value =
            serde_json::from_str(json).map_err(|e| TranscodeError::Probe(e.to_string()))?;

        let duration = info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let streams = info["streams"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .ok_or_else(|| TranscodeError::Probe("no video stream".to_string()))?;
        let has_audio = streams.iter().any(|s| s["codec_type"] == "audio");

        Ok(Self {
            duration,
            width: video_stream["width"].as_u64().unwrap_or(0) as u32,
            height: video_stream["height"].as_u64().unwrap_or(0) as u32,
            codec: video_stream["codec_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            has_audio,
        })
    }
}

//! Post-processing of the reassembled stream with an external ffmpeg binary.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::DownloadError;

#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Convert `input` into `output`.
    ///
    /// Implementations never delete `input`; the caller removes it once the
    /// output is in place.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<(), DownloadError>;
}

#[derive(Debug, Clone)]
pub struct RemuxConfig {
    pub ffmpeg_path: String,
    /// Output container, passed with `-f` so the extension of `output` is irrelevant.
    pub format: String,
    pub faststart: bool,
    /// Extra arguments inserted before the output path.
    pub output_options: Vec<String>,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            format: "mp4".to_string(),
            faststart: true,
            output_options: Vec::new(),
        }
    }
}

/// Stream-copy remux (`-c copy`) into the configured container.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRemuxer {
    config: RemuxConfig,
}

impl FfmpegRemuxer {
    pub fn new(config: RemuxConfig) -> Self {
        Self { config }
    }

    pub fn with_ffmpeg_path(path: impl Into<String>) -> Self {
        Self::new(RemuxConfig {
            ffmpeg_path: path.into(),
            ..RemuxConfig::default()
        })
    }

    pub fn config(&self) -> &RemuxConfig {
        &self.config
    }

    fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        args.extend(["-i".to_string(), input.to_string_lossy().into_owned()]);
        args.extend(["-c:v", "copy", "-c:a", "copy"].map(String::from));

        let container = self.config.format.to_ascii_lowercase();
        if self.config.faststart && matches!(container.as_str(), "mp4" | "mov" | "m4v") {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
        args.extend(["-f".to_string(), container]);
        args.extend(self.config.output_options.iter().cloned());

        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl PostProcessor for FfmpegRemuxer {
    #[instrument(skip(self, token), fields(input = %input.display()))]
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let args = self.build_args(input, output);
        debug!(ffmpeg = %self.config.ffmpeg_path, ?args, "Starting ffmpeg");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Transcode {
                status: "not started".to_string(),
                reason: format!("failed to run {}: {e}", self.config.ffmpeg_path),
            })?;

        // Dropping the wait future on cancellation kills the child.
        let result = tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled, stopping ffmpeg");
                return Err(DownloadError::Cancelled);
            }
            result = child.wait_with_output() => result,
        };
        let output_status = result.map_err(|e| DownloadError::Transcode {
            status: "unknown".to_string(),
            reason: format!("failed to wait for ffmpeg: {e}"),
        })?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown ffmpeg error")
                .trim()
                .to_string();
            let status = output_status
                .status
                .code()
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(DownloadError::Transcode { status, reason });
        }

        info!(output = %output.display(), "Transcode finished");
        Ok(())
    }
}

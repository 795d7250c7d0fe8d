//! ffmpeg / ffprobe adapter.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::traits::MediaProbe;
use crate::error::ExternalTool;
use crate::utils::process::{find_binary, output_text, tokio_command};
use crate::{Error, Result};

/// Offset of the frame grabbed for thumbnails.
const THUMBNAIL_OFFSET: &str = "00:00:01";

/// Probe backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run(program: &str, mut cmd: Command) -> Result<std::process::Output> {
        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ExternalToolNotFound(ExternalTool::Ffmpeg)
            } else {
                Error::processing(format!("Failed to run {program}: {e}"))
            }
        })
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

/// Format seconds as "H:MM:SS", "M:SS" or "S".
pub fn format_duration(total_secs: f64) -> String {
    let total = if total_secs.is_finite() && total_secs > 0.0 {
        total_secs as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        format!("{seconds}")
    }
}

#[async_trait]
impl MediaProbe for Ffmpeg {
    fn is_available(&self) -> bool {
        find_binary(&self.ffmpeg).is_some() && find_binary(&self.ffprobe).is_some()
    }

    async fn video_duration(&self, path: &Path) -> Result<String> {
        let mut cmd = tokio_command(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path);
        let output = Self::run(&self.ffprobe, cmd).await?;

        if !output.status.success() {
            debug!(path = %path.display(), output = %output_text(&output), "ffprobe failed");
            return Err(Error::ProcessExit {
                tool: "ffprobe".to_string(),
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let secs: f64 = stdout.trim().parse().map_err(|_| {
            Error::processing(format!("Unexpected ffprobe duration: {}", stdout.trim()))
        })?;
        Ok(format_duration(secs))
    }

    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<()> {
        let mut cmd = tokio_command(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-ss", THUMBNAIL_OFFSET, "-vframes", "1"])
            .arg(output);
        let result = Self::run(&self.ffmpeg, cmd).await?;

        if !result.status.success() {
            debug!(video = %video.display(), output = %output_text(&result), "ffmpeg frame grab failed");
            return Err(Error::ProcessExit {
                tool: ExternalTool::Ffmpeg.to_string(),
                code: result.status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3723.4), "1:02:03");
        assert_eq!(format_duration(245.0), "4:05");
        assert_eq!(format_duration(59.9), "59");
        assert_eq!(format_duration(0.0), "0");
        assert_eq!(format_duration(f64::NAN), "0");
    }

    #[tokio::test]
    async fn test_missing_binary_maps_to_tool_not_found() {
        let probe = Ffmpeg::new("/no/such/ffmpeg", "/no/such/ffprobe");
        assert!(!probe.is_available());

        let err = probe
            .video_duration(Path::new("/tmp/x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ExternalToolNotFound(ExternalTool::Ffmpeg)
        ));
    }
}

//! yt-dlp adapter.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::{MediaDownloader, VideoFormat, VideoInfo};
use crate::error::ExternalTool;
use crate::utils::process::{find_binary, output_text, tokio_command};
use crate::{Error, Result};

/// Format selector used when the caller does not pick one.
pub const DEFAULT_FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]";

/// Output yt-dlp prints when a video has no thumbnail.
const NO_THUMBNAILS_MARKER: &str = "There are no video thumbnails to download";

/// Downloader backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self) -> Command {
        tokio_command(&self.binary)
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        self.command().args(args).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ExternalToolNotFound(ExternalTool::YtDlp)
            } else {
                Error::processing(format!("Failed to run yt-dlp: {e}"))
            }
        })
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Format selector for an optional user-chosen video format.
pub fn format_selector(format: Option<&str>) -> String {
    match format.map(str::trim).filter(|f| !f.is_empty()) {
        Some(format) => format!("{format}+bestaudio[ext=m4a]/best[ext=mp4]"),
        None => DEFAULT_FORMAT_SELECTOR.to_string(),
    }
}

/// Parse `--get-title --get-duration` output: title first, then duration.
fn parse_video_info(stdout: &str) -> VideoInfo {
    let mut lines = stdout.trim().lines().map(str::trim);
    VideoInfo {
        title: lines.next().unwrap_or_default().to_string(),
        duration: lines.next().unwrap_or_default().to_string(),
    }
}

/// Keep the mp4 rows of the `--list-formats` table.
fn parse_formats(stdout: &str) -> Vec<VideoFormat> {
    stdout
        .lines()
        .filter(|line| line.contains('|'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let format_id = fields.next()?;
            let ext = fields.next()?;
            let resolution = fields.next()?;
            (ext == "mp4").then(|| VideoFormat {
                format_id: format_id.to_string(),
                ext: ext.to_string(),
                resolution: resolution.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl MediaDownloader for YtDlp {
    fn is_available(&self) -> bool {
        find_binary(&self.binary).is_some()
    }

    async fn extract_video_info(&self, url: &str) -> Result<VideoInfo> {
        let output = self.output(&["--get-title", "--get-duration", url]).await?;
        if !output.status.success() {
            warn!(url = %url, output = %output_text(&output), "yt-dlp failed to extract video info");
            return Err(Error::ProcessExit {
                tool: ExternalTool::YtDlp.to_string(),
                code: output.status.code(),
            });
        }

        let info = parse_video_info(&String::from_utf8_lossy(&output.stdout));
        if info.title.is_empty() {
            return Err(Error::processing(format!("No title found for {url}")));
        }
        if info.duration.is_empty() {
            debug!(url = %url, "yt-dlp reported no duration");
        }
        Ok(info)
    }

    async fn download_thumbnail(&self, url: &str, output_base: &Path) -> Result<()> {
        let output_base = output_base.to_string_lossy();
        let output = self
            .output(&[
                "--write-thumbnail",
                "--skip-download",
                "--convert-thumbnails",
                "jpg",
                "-o",
                &*output_base,
                url,
            ])
            .await?;

        let text = output_text(&output);
        if !output.status.success() {
            debug!(url = %url, output = %text, "yt-dlp thumbnail download failed");
            return Err(Error::ProcessExit {
                tool: ExternalTool::YtDlp.to_string(),
                code: output.status.code(),
            });
        }
        if text.contains(NO_THUMBNAILS_MARKER) {
            return Err(Error::processing("No video thumbnails to download"));
        }
        Ok(())
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<VideoFormat>> {
        let output = self.output(&["--list-formats", url]).await?;
        if !output.status.success() {
            return Err(Error::ProcessExit {
                tool: ExternalTool::YtDlp.to_string(),
                code: output.status.code(),
            });
        }
        Ok(parse_formats(&String::from_utf8_lossy(&output.stdout)))
    }

    fn download_command(&self, url: &str, format: Option<&str>, output: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("-c")
            .arg("--newline")
            .arg("-f")
            .arg(format_selector(format))
            .arg("-o")
            .arg(output)
            .arg(url);
        cmd
    }
}

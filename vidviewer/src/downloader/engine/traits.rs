//! Traits for the external tools the library shells out to.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::Result;

/// Title and display duration of a remote video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
    /// Empty when the tool could not report it.
    pub duration: String,
}

/// One downloadable format of a remote video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub ext: String,
    pub resolution: String,
}

/// Fetches metadata and content for remote videos.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Whether the backing binary can be found.
    fn is_available(&self) -> bool;

    async fn extract_video_info(&self, url: &str) -> Result<VideoInfo>;

    /// Write the video's thumbnail as `{output_base}.jpg`.
    async fn download_thumbnail(&self, url: &str, output_base: &Path) -> Result<()>;

    async fn list_formats(&self, url: &str) -> Result<Vec<VideoFormat>>;

    /// Build, but do not spawn, the command downloading `url` to `output`.
    ///
    /// The command must print progress lines on stdout.
    fn download_command(&self, url: &str, format: Option<&str>, output: &Path) -> Command;
}

/// Inspects local media files.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    fn is_available(&self) -> bool;

    /// Display duration ("1:02:03", "4:05" or "59").
    async fn video_duration(&self, path: &Path) -> Result<String>;

    /// Grab a single frame of `video` into `output`.
    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<()>;
}

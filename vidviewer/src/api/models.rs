//! Request and response bodies for the HTTP API.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::database::models::{PlaylistDbModel, PlaylistVideoQuery, SortOrder};

/// Body of `PUT /config`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfigRequest {
    pub root_folder_path: String,
}

/// Body of `POST /playlists` and `PUT /playlists/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistRequest {
    pub name: String,
}

/// Body of `POST /playlist_videos` and `DELETE /playlist_videos`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlaylistVideoRequest {
    pub playlist_id: i64,
    pub video_id: i64,
}

/// Where a new video comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Disk,
    YtDlp,
}

impl VideoSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "disk" => Some(Self::Disk),
            "ytdlp" => Some(Self::YtDlp),
            _ => None,
        }
    }
}

/// Body of `POST /videos`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewVideoRequest {
    pub source: String,
    pub playlist_id: i64,
    pub folder: String,
    pub url: String,
    pub format: String,
}

impl NewVideoRequest {
    /// Checks the form fields, collecting every failure.
    ///
    /// `playlist_exists` is consulted only when the id is in range.
    pub fn validate(&self, playlist_exists: bool) -> Result<VideoSource, Vec<String>> {
        let mut errors = Vec::new();

        if self.playlist_id < 1 {
            errors.push("Invalid playlist".to_string());
        } else if !playlist_exists {
            errors.push("Could not find playlist".to_string());
        }

        let source = VideoSource::parse(&self.source);
        match source {
            Some(VideoSource::Disk) => {
                if self.folder.trim().is_empty() {
                    errors.push("Folder cannot be blank".to_string());
                } else if !Path::new(self.folder.trim()).is_dir() {
                    errors.push("Folder does not exist".to_string());
                }
            }
            Some(VideoSource::YtDlp) => {
                if self.url.trim().is_empty() {
                    errors.push("URL cannot be blank".to_string());
                } else if !is_valid_url(self.url.trim()) {
                    errors.push("Invalid URL".to_string());
                }
            }
            None => errors.push("Form type not disk, or ydlp".to_string()),
        }

        match source {
            Some(source) if errors.is_empty() => Ok(source),
            _ => Err(errors),
        }
    }

    /// Requested format id, if any.
    pub fn format(&self) -> Option<String> {
        let format = self.format.trim();
        (!format.is_empty()).then(|| format.to_string())
    }
}

/// A URL needs both a scheme and a host.
pub fn is_valid_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Body of `PUT /videos/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: String,
}

/// Query of `GET /playlist/{id}/videos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistVideosQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<u32>,
}

impl PlaylistVideosQuery {
    pub fn into_query(self, playlist_id: i64) -> PlaylistVideoQuery {
        let mut query = PlaylistVideoQuery::new(playlist_id);
        if let Some(page) = self.page.filter(|p| *p > 0) {
            query.page = page;
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            query.limit = limit;
        }
        query.search = self.search.filter(|s| !s.trim().is_empty());
        query.sort = SortOrder::from_code(self.sort_by.unwrap_or(0));
        query
    }
}

/// Query of `GET /video_formats`.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatsQuery {
    pub url: String,
}

/// Response of a URL submission.
#[derive(Debug, Clone, Serialize)]
pub struct VideoCreatedResponse {
    pub video_id: i64,
}

/// Playlist as listed for a single video.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
}

impl From<PlaylistDbModel> for PlaylistSummary {
    fn from(playlist: PlaylistDbModel) -> Self {
        Self {
            id: playlist.id,
            name: playlist.name,
        }
    }
}

/// Response of `GET /logging` and `PUT /logging`.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
}

/// Body of `PUT /logging`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

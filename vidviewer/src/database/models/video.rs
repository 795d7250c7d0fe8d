//! Video database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::now_library_date;

/// Container extension used for downloads fetched from a URL.
pub const DEFAULT_FILE_FORMAT: &str = "mp4";

/// A video record, complete or still downloading.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct VideoDbModel {
    pub id: i64,
    pub url: Option<String>,
    /// Opaque 12-char id naming the files on disk.
    pub file_id: String,
    /// Container extension without the dot ("mp4", "webm").
    pub file_format: String,
    pub title: String,
    /// Display duration ("1:02:03", "4:05", "59"); empty until known.
    pub duration: String,
    pub download_complete: bool,
    pub download_date: String,
    pub md5_checksum: String,
    /// Requested format selector for URL downloads.
    pub video_format: Option<String>,
}

impl VideoDbModel {
    /// A placeholder row for a download that has not produced a file yet.
    pub fn pending_download(
        url: impl Into<String>,
        file_id: impl Into<String>,
        title: impl Into<String>,
        duration: impl Into<String>,
        video_format: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            url: Some(url.into()),
            file_id: file_id.into(),
            file_format: DEFAULT_FILE_FORMAT.to_string(),
            title: title.into(),
            duration: duration.into(),
            download_complete: false,
            download_date: now_library_date(),
            md5_checksum: String::new(),
            video_format: video_format.filter(|f| !f.trim().is_empty()),
        }
    }

    /// A completed row for a file imported from disk.
    pub fn imported(
        file_id: impl Into<String>,
        file_format: impl Into<String>,
        title: impl Into<String>,
        md5_checksum: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            url: None,
            file_id: file_id.into(),
            file_format: file_format.into(),
            title: title.into(),
            duration: String::new(),
            download_complete: true,
            download_date: now_library_date(),
            md5_checksum: md5_checksum.into(),
            video_format: None,
        }
    }

    /// Key under which the download manager tracks this video.
    pub fn download_key(&self) -> String {
        self.id.to_string()
    }
}

/// Columns a video may be looked up by.
///
/// Restricting lookups to this set keeps column names out of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VideoLookupField {
    #[strum(serialize = "url")]
    Url,
    #[strum(serialize = "md5_checksum")]
    Md5Checksum,
    #[strum(serialize = "file_id")]
    FileId,
}

impl VideoLookupField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Md5Checksum => "md5_checksum",
            Self::FileId => "file_id",
        }
    }
}

/// Sort direction for playlist listings, by download date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    /// `0` selects newest first; anything else oldest first.
    pub fn from_code(code: u32) -> Self {
        if code == 0 {
            Self::NewestFirst
        } else {
            Self::OldestFirst
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NewestFirst => "DESC",
            Self::OldestFirst => "ASC",
        }
    }
}

/// Paging and filtering for videos in a playlist.
#[derive(Debug, Clone)]
pub struct PlaylistVideoQuery {
    pub playlist_id: i64,
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort: SortOrder,
}

impl PlaylistVideoQuery {
    pub fn new(playlist_id: i64) -> Self {
        Self {
            playlist_id,
            page: 1,
            limit: 10,
            search: None,
            sort: SortOrder::default(),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.limit)
    }
}

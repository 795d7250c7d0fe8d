//! Messages delivered through the notification hub.
//!
//! The wire shape is `{"type": "<snake_case>", "payload": ...}`; `payload`
//! is omitted for messages without one.

use serde::{Deserialize, Serialize};

use crate::error::ExternalTool;

/// Point-in-time projection of a download for the status batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatusSnapshot {
    /// Unix seconds when the download was registered.
    pub time_started: i64,
    /// Unix seconds when it finished; 0 while unfinished.
    pub time_completed: i64,
    pub video_id: i64,
    pub is_complete: bool,
    pub is_cancelled: bool,
    pub is_error: bool,
    pub is_paused: bool,
    pub url: String,
    pub title: String,
    pub progress: u8,
    pub speed: String,
}

impl DownloadStatusSnapshot {
    /// Neither cancelled nor complete. Paused and errored downloads count,
    /// so the batch keeps reporting them.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled && !self.is_complete
    }
}

/// A message pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum HubMessage {
    DownloadStatus(Vec<DownloadStatusSnapshot>),
    VideoDownloadSuccess,
    VideoDownloadFail,
    RootFolderNotFound,
    FfmpegNotFound,
    YtdlpNotFound,
}

impl HubMessage {
    /// The "missing binary" message for a tool.
    pub fn tool_not_found(tool: ExternalTool) -> Self {
        match tool {
            ExternalTool::Ffmpeg => Self::FfmpegNotFound,
            ExternalTool::YtDlp => Self::YtdlpNotFound,
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DownloadStatus(_) => "download_status",
            Self::VideoDownloadSuccess => "video_download_success",
            Self::VideoDownloadFail => "video_download_fail",
            Self::RootFolderNotFound => "root_folder_not_found",
            Self::FfmpegNotFound => "ffmpeg_not_found",
            Self::YtdlpNotFound => "ytdlp_not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DownloadStatusSnapshot {
        DownloadStatusSnapshot {
            time_started: 100,
            time_completed: 0,
            video_id: 7,
            is_complete: false,
            is_cancelled: false,
            is_error: false,
            is_paused: false,
            url: "https://example.com/v1".to_string(),
            title: "Title".to_string(),
            progress: 45,
            speed: "1.2MiB/s".to_string(),
        }
    }

    #[test]
    fn test_unit_message_has_no_payload() {
        let json = serde_json::to_string(&HubMessage::VideoDownloadSuccess).unwrap();
        assert_eq!(json, r#"{"type":"video_download_success"}"#);
        let json = serde_json::to_string(&HubMessage::tool_not_found(ExternalTool::YtDlp)).unwrap();
        assert_eq!(json, r#"{"type":"ytdlp_not_found"}"#);
    }

    #[test]
    fn test_status_batch_shape() {
        let value = serde_json::to_value(HubMessage::DownloadStatus(vec![snapshot()])).unwrap();
        assert_eq!(value["type"], "download_status");

        let item = &value["payload"][0];
        for key in [
            "time_started",
            "time_completed",
            "video_id",
            "is_complete",
            "is_cancelled",
            "is_error",
            "is_paused",
            "url",
            "title",
            "progress",
            "speed",
        ] {
            assert!(item.get(key).is_some(), "missing {key}");
        }
        assert_eq!(item["progress"], 45);
        assert_eq!(item["speed"], "1.2MiB/s");
    }

    #[test]
    fn test_kind_matches_wire_name() {
        for msg in [
            HubMessage::DownloadStatus(vec![]),
            HubMessage::VideoDownloadSuccess,
            HubMessage::VideoDownloadFail,
            HubMessage::RootFolderNotFound,
            HubMessage::FfmpegNotFound,
            HubMessage::YtdlpNotFound,
        ] {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.kind());
        }
    }

    #[test]
    fn test_snapshot_activity() {
        let mut s = snapshot();
        assert!(s.is_active());
        s.is_paused = true;
        assert!(s.is_active());
        s.is_error = true;
        assert!(s.is_active());
        s.is_cancelled = true;
        assert!(!s.is_active());

        let mut done = snapshot();
        done.is_complete = true;
        assert!(!done.is_active());
    }
}

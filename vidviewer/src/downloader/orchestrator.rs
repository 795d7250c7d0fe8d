//! Drives a URL download from process launch to a finished library entry.
//!
//! On success the video and thumbnail land in their shard folder and the
//! record is marked complete. Any failure rolls back the record, its playlist
//! links and every file produced so far.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::download::{CancelOutcome, Download, DownloadStatus};
use super::engine::{
    MediaDownloader, MediaProbe, ProcessOutcome, parse_progress_line, run_process,
};
use super::manager::DownloadManager;
use crate::database::models::{VideoDbModel, VideoLookupField};
use crate::database::repositories::VideoRepository;
use crate::database::time::now_library_date;
use crate::error::ExternalTool;
use crate::files::{FileStore, IMAGE_EXT};
use crate::notification::{HubMessage, notify};
use crate::utils::checksum::md5_file;
use crate::utils::file_id::generate_file_id;
use crate::{Error, Result};

/// How a download task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    Failed(String),
    /// Cancelled by the user; everything was cleaned up.
    Cancelled,
    /// Stopped by shutdown; the record is kept for a later resume.
    Interrupted,
}

/// A running download task.
#[derive(Debug)]
pub struct StartedDownload {
    pub download: Arc<Download>,
    pub task: JoinHandle<DownloadOutcome>,
}

/// A request to add a video from a URL.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub url: String,
    pub playlist_id: i64,
    /// Format id chosen from `list_formats`, if any.
    pub video_format: Option<String>,
}

/// Wires the download manager to the repositories, file store and tools.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    manager: Arc<DownloadManager>,
    videos: Arc<dyn VideoRepository>,
    downloader: Arc<dyn MediaDownloader>,
    probe: Arc<dyn MediaProbe>,
}

impl DownloadOrchestrator {
    pub fn new(
        manager: Arc<DownloadManager>,
        videos: Arc<dyn VideoRepository>,
        downloader: Arc<dyn MediaDownloader>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            manager,
            videos,
            downloader,
            probe,
        }
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    pub fn downloader(&self) -> &Arc<dyn MediaDownloader> {
        &self.downloader
    }

    pub fn probe(&self) -> &Arc<dyn MediaProbe> {
        &self.probe
    }

    /// Add a video from a URL, resuming or restarting an unfinished one.
    ///
    /// Returns the video id; the download itself continues in the background.
    pub async fn submit_url(&self, request: SubmitRequest, store: &FileStore) -> Result<i64> {
        store.initialize().await?;

        if let Some(existing) = self
            .videos
            .get_by(VideoLookupField::Url, &request.url)
            .await?
            && let Some(id) = self.submit_existing(existing, store).await?
        {
            return Ok(id);
        }

        let info = self.downloader.extract_video_info(&request.url).await?;
        let mut video = VideoDbModel::pending_download(
            &request.url,
            generate_file_id(),
            info.title,
            info.duration,
            request.video_format,
        );
        video.id = self
            .videos
            .create_in_playlist(&video, request.playlist_id)
            .await?;
        info!(video_id = video.id, url = %request.url, "Video created, starting download");

        let id = video.id;
        if let Err(e) = self.start_download(video, store.clone()) {
            if let Err(rollback) = self.videos.delete_with_associations(id).await {
                error!(video_id = id, error = %rollback, "Failed to roll back video");
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Resume or restart the download of a known video. `None` means the
    /// record was rolled back meanwhile and the caller should start over.
    async fn submit_existing(
        &self,
        existing: VideoDbModel,
        store: &FileStore,
    ) -> Result<Option<i64>> {
        if existing.download_complete {
            return Err(Error::already_exists("Video", existing.id.to_string()));
        }

        let id = existing.id;
        match self.manager.get_download(&existing.download_key()) {
            Some(download) if download.status() == DownloadStatus::Paused => {
                self.resume_download(download.key(), store.clone())?;
            }
            // Also covers a cancelled or failed download still rolling back.
            Some(download) if !download.is_settled() => {
                return Err(Error::already_exists("Download", download.key()));
            }
            _ => {
                // A settled entry has finished its rollback, so the record
                // read above may already be gone.
                let current = match self.videos.get(id).await {
                    Ok(current) => current,
                    Err(Error::NotFound { .. }) => return Ok(None),
                    Err(e) => return Err(e),
                };
                info!(video_id = id, "Restarting unfinished download");
                self.start_download(current, store.clone())?;
            }
        }
        Ok(Some(id))
    }

    /// Register a download for `video` and run it in the background.
    pub fn start_download(&self, video: VideoDbModel, store: FileStore) -> Result<StartedDownload> {
        let download = self.manager.add_new_download(video)?;
        self.spawn(download, store)
    }

    /// Restart a paused download on the same entry; yt-dlp continues any
    /// partial file left in the temp folder.
    pub fn resume_download(&self, key: &str, store: FileStore) -> Result<StartedDownload> {
        let download = self.manager.on_resume_download(key)?;
        self.spawn(download, store)
    }

    /// Cancel a download. When no worker owns it, clean up here.
    pub async fn cancel(&self, key: &str, store: &FileStore) -> Result<CancelOutcome> {
        let (download, outcome) = self.manager.cancel_download(key)?;
        if outcome == CancelOutcome::Detached {
            self.discard(&download, store).await;
            download.detach();
        }
        Ok(outcome)
    }

    fn spawn(&self, download: Arc<Download>, store: FileStore) -> Result<StartedDownload> {
        download.begin()?;

        let this = self.clone();
        let worker = download.clone();
        let task = tokio::spawn(async move { this.drive(worker, store).await });
        Ok(StartedDownload { download, task })
    }

    async fn drive(&self, download: Arc<Download>, store: FileStore) -> DownloadOutcome {
        let video_id = download.video().id;
        let result = self.download_and_finalize(&download, &store).await;

        match result {
            Ok(()) => {
                info!(video_id, "Download completed");
                notify(self.manager.hub(), HubMessage::VideoDownloadSuccess);
                DownloadOutcome::Completed
            }
            Err(e) if e.is_cancelled() || download.is_user_cancelled() => {
                if download.is_user_cancelled() {
                    info!(video_id, "Download cancelled, cleaning up");
                    self.discard(&download, &store).await;
                    download.detach();
                    DownloadOutcome::Cancelled
                } else {
                    info!(video_id, "Download interrupted by shutdown");
                    download.detach();
                    DownloadOutcome::Interrupted
                }
            }
            Err(e) => {
                let msg = e.to_string();
                error!(video_id, error = %msg, "Download failed, rolling back");
                download.fail(&msg);
                self.discard(&download, &store).await;
                download.detach();
                notify(self.manager.hub(), HubMessage::VideoDownloadFail);
                DownloadOutcome::Failed(msg)
            }
        }
    }

    async fn download_and_finalize(&self, download: &Arc<Download>, store: &FileStore) -> Result<()> {
        let video = download.video();
        let url = video
            .url
            .clone()
            .ok_or_else(|| Error::validation("Video has no source URL"))?;
        let temp_video = temp_video_path(store, &video);

        let command =
            self.downloader
                .download_command(&url, video.video_format.as_deref(), &temp_video);
        let progress_target = download.clone();
        let tool = ExternalTool::YtDlp.to_string();
        let timeout = self.manager.config().process_timeout;

        let outcome = run_process(
            &tool,
            command,
            download.cancel_token(),
            timeout,
            move |line| {
                if let Some(update) = parse_progress_line(line) {
                    progress_target.update_progress(update.percent, update.speed);
                }
            },
        )
        .await?;

        match outcome {
            ProcessOutcome::Exited(Some(0)) => {}
            ProcessOutcome::Exited(code) => return Err(Error::ProcessExit { tool, code }),
            ProcessOutcome::Cancelled => return Err(Error::Cancelled),
            ProcessOutcome::TimedOut => {
                return Err(Error::ProcessTimeout {
                    tool,
                    timeout_secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
        }

        self.finalize(download, store, &url, &temp_video).await
    }

    /// Post-process a finished download into the library.
    async fn finalize(
        &self,
        download: &Download,
        store: &FileStore,
        url: &str,
        temp_video: &Path,
    ) -> Result<()> {
        let mut video = download.video();

        ensure_live(download)?;
        if video.duration.trim().is_empty() {
            video.duration = self.probe.video_duration(temp_video).await?;
            self.videos.update(&video).await?;
            let duration = video.duration.clone();
            download.update_video(|v| v.duration = duration);
        }

        ensure_live(download)?;
        let temp_image = store.temp_dir().join(format!("{}.{}", video.file_id, IMAGE_EXT));
        self.fetch_thumbnail(url, store, &video.file_id, temp_video, &temp_image)
            .await?;

        ensure_live(download)?;
        store.create_file_folders(&video.file_id).await?;
        let final_video = store.file_path(&video.file_id, &video.file_format);
        let final_image = store.file_path(&video.file_id, IMAGE_EXT);
        store.move_file(temp_video, &final_video).await?;
        store.move_file(&temp_image, &final_image).await?;

        ensure_live(download)?;
        video.md5_checksum = md5_file(&final_video).await?;
        video.download_complete = true;
        video.download_date = now_library_date();

        ensure_live(download)?;
        self.videos.update(&video).await?;
        download.update_video(|v| *v = video.clone());

        // Fails if a cancel slipped in after the update; the caller then
        // discards the record like any other cancellation.
        download.complete()
    }

    /// yt-dlp's own thumbnail first, then a frame grab from the video.
    async fn fetch_thumbnail(
        &self,
        url: &str,
        store: &FileStore,
        file_id: &str,
        temp_video: &Path,
        temp_image: &Path,
    ) -> Result<()> {
        let output_base = store.temp_dir().join(file_id);
        match self.downloader.download_thumbnail(url, &output_base).await {
            Ok(()) if temp_image.exists() => return Ok(()),
            Ok(()) => debug!(file_id = %file_id, "yt-dlp wrote no thumbnail, extracting a frame"),
            Err(e) => debug!(file_id = %file_id, error = %e, "Thumbnail fetch failed, extracting a frame"),
        }

        self.probe
            .extract_thumbnail(temp_video, temp_image)
            .await
            .map_err(|e| Error::processing(format!("Thumbnail extraction failed: {e}")))
    }

    /// Remove the record, its playlist links and every file of a download.
    async fn discard(&self, download: &Download, store: &FileStore) {
        let video = download.video();
        if let Err(e) = self.videos.delete_with_associations(video.id).await {
            error!(video_id = video.id, error = %e, "Failed to delete video record");
        }
        store.discard_download(&video.file_id, &video.file_format).await;
        debug!(video_id = video.id, "Download discarded");
    }
}

/// Where yt-dlp writes a video while downloading.
pub fn temp_video_path(store: &FileStore, video: &VideoDbModel) -> PathBuf {
    store
        .temp_dir()
        .join(format!("{}.{}", video.file_id, video.file_format))
}

fn ensure_live(download: &Download) -> Result<()> {
    if download.cancel_token().is_cancelled() {
        warn!(key = %download.key(), "Stopping post-processing, download cancelled");
        return Err(Error::Cancelled);
    }
    Ok(())
}

//! Download Manager implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcaster::{StatusTicker, order_batch};
use super::download::{CancelOutcome, Download};
use crate::database::models::VideoDbModel;
use crate::database::repositories::VideoRepository;
use crate::database::time::now_secs;
use crate::notification::{DownloadStatusSnapshot, HubMessage, NotificationHub, notify};
use crate::{Error, Result};

/// Configuration for the Download Manager.
#[derive(Debug, Clone)]
pub struct DownloadManagerConfig {
    /// Period of the status broadcast.
    pub status_interval: Duration,
    /// Maximum snapshots per status batch.
    pub status_batch_limit: usize,
    /// Kill download processes running longer than this.
    pub process_timeout: Option<Duration>,
    /// Forget finished downloads after this long.
    pub retention: Option<Duration>,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(1),
            status_batch_limit: 10,
            process_timeout: None,
            retention: None,
        }
    }
}

/// Owns the table of downloads, keyed by video id.
pub struct DownloadManager {
    config: DownloadManagerConfig,
    downloads: DashMap<String, Arc<Download>>,
    initialized: AtomicBool,
    broadcaster_started: AtomicBool,
    hub: Option<Arc<NotificationHub>>,
    /// Parent of every download's token; fired on shutdown.
    shutdown: CancellationToken,
}

impl DownloadManager {
    pub fn new(config: DownloadManagerConfig, hub: Option<Arc<NotificationHub>>) -> Self {
        Self {
            config,
            downloads: DashMap::new(),
            initialized: AtomicBool::new(false),
            broadcaster_started: AtomicBool::new(false),
            hub,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DownloadManagerConfig {
        &self.config
    }

    pub fn hub(&self) -> Option<&NotificationHub> {
        self.hub.as_deref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Register downloads interrupted by a previous run as paused, then start
    /// the status broadcaster. Only the first successful call does anything.
    pub async fn initialize(self: &Arc<Self>, repo: &dyn VideoRepository) -> Result<usize> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Download manager already initialized");
            return Ok(0);
        }

        let videos = match repo.get_incomplete_downloads().await {
            Ok(videos) => videos,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let mut restored = 0;
        for video in videos {
            match self.add_previous_download(video) {
                Ok(_) => restored += 1,
                Err(e) => warn!(error = %e, "Skipping interrupted download"),
            }
        }

        info!(count = restored, "Download manager initialized");
        self.start_status_updates();
        Ok(restored)
    }

    /// Track a new download. An existing download under the same key is
    /// replaced only once it is finished and its owner has let go, so a
    /// pending rollback never runs against the new one.
    pub fn add_new_download(&self, video: VideoDbModel) -> Result<Arc<Download>> {
        self.insert(Download::new(video, self.shutdown.child_token()))
    }

    /// Track a download left incomplete by a previous run, as paused.
    pub fn add_previous_download(&self, video: VideoDbModel) -> Result<Arc<Download>> {
        self.insert(Download::paused(video, self.shutdown.child_token()))
    }

    fn insert(&self, download: Download) -> Result<Arc<Download>> {
        let download = Arc::new(download);
        match self.downloads.entry(download.key().to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_settled() {
                    return Err(Error::already_exists("Download", download.key()));
                }
                debug!(key = %download.key(), "Replacing finished download");
                entry.insert(download.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(download.clone());
            }
        }
        Ok(download)
    }

    pub fn get_download(&self, key: &str) -> Option<Arc<Download>> {
        self.downloads.get(key).map(|d| d.value().clone())
    }

    /// Cancel a download. Cancelling a finished download is a no-op.
    pub fn cancel_download(&self, key: &str) -> Result<(Arc<Download>, CancelOutcome)> {
        let download = self
            .get_download(key)
            .ok_or_else(|| Error::not_found("Download", key))?;
        let outcome = download.cancel();
        info!(key = %key, outcome = ?outcome, "Download cancel requested");
        Ok((download, outcome))
    }

    /// Move a paused download back to pending so a worker can restart it.
    pub fn on_resume_download(&self, key: &str) -> Result<Arc<Download>> {
        let download = self
            .get_download(key)
            .ok_or_else(|| Error::not_found("Download", key))?;
        download.resume()?;
        info!(key = %key, "Download resumed");
        Ok(download)
    }

    /// Drop a download from the table.
    pub fn remove_download(&self, key: &str) -> Option<Arc<Download>> {
        self.downloads.remove(key).map(|(_, d)| d)
    }

    /// The current status batch, ordered and truncated like the broadcast.
    pub fn snapshots(&self) -> Vec<DownloadStatusSnapshot> {
        order_batch(self.all_snapshots(), self.config.status_batch_limit)
    }

    fn all_snapshots(&self) -> Vec<DownloadStatusSnapshot> {
        self.downloads.iter().map(|d| d.value().snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    /// Forget finished downloads that completed more than `older_than` ago.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let cutoff = now_secs() - i64::try_from(older_than.as_secs()).unwrap_or(i64::MAX);
        let before = self.downloads.len();
        self.downloads
            .retain(|_, d| {
                !(d.is_settled() && matches!(d.finished_at(), Some(finished) if finished < cutoff))
            });
        let evicted = before.saturating_sub(self.downloads.len());
        if evicted > 0 {
            debug!(count = evicted, "Evicted finished downloads");
        }
        evicted
    }

    /// Spawn the periodic status broadcaster. Later calls are ignored.
    pub fn start_status_updates(self: &Arc<Self>) {
        if self.broadcaster_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let manager = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.status_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut ticker = StatusTicker::new(manager.config.status_batch_limit);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Status broadcaster shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Some(retention) = manager.config.retention {
                            manager.evict_finished(retention);
                        }
                        if let Some(batch) = ticker.tick(manager.all_snapshots()) {
                            notify(manager.hub(), HubMessage::DownloadStatus(batch));
                        }
                    }
                }
            }
        });
    }

    /// Stop the broadcaster and kill every running download process.
    ///
    /// Interrupted downloads keep their records and come back paused on the
    /// next start.
    pub fn shutdown(&self) {
        info!(count = self.downloads.len(), "Shutting down download manager");
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::DownloadStatus;

    fn video(id: i64) -> VideoDbModel {
        let mut video = VideoDbModel::pending_download(
            format!("https://example.com/v{id}"),
            format!("abcdef{id:06}"),
            format!("Video {id}"),
            "",
            None,
        );
        video.id = id;
        video
    }

    fn manager() -> DownloadManager {
        DownloadManager::new(DownloadManagerConfig::default(), None)
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let m = manager();
        let first = m.add_new_download(video(1)).unwrap();
        first.begin().unwrap();
        first.update_progress(30, "1MiB/s");

        let err = m.add_new_download(video(1)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));

        let current = m.get_download("1").unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.progress().0, 30);
    }

    #[test]
    fn test_finished_download_can_be_replaced() {
        let m = manager();
        let first = m.add_new_download(video(1)).unwrap();
        first.begin().unwrap();
        first.fail("boom");
        first.detach();

        let second = m.add_new_download(video(1)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_cancelled_download_blocks_key_until_cleanup() {
        let m = manager();
        let first = m.add_new_download(video(1)).unwrap();
        first.begin().unwrap();
        let (_, outcome) = m.cancel_download("1").unwrap();
        assert_eq!(outcome, CancelOutcome::Signalled);

        let err = m.add_new_download(video(1)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(Arc::ptr_eq(&first, &m.get_download("1").unwrap()));

        first.detach();
        let second = m.add_new_download(video(1)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cancel_unknown_is_not_found() {
        let m = manager();
        let err = m.cancel_download("42").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_cancel_twice() {
        let m = manager();
        let d = m.add_new_download(video(1)).unwrap();
        d.begin().unwrap();

        let (_, first) = m.cancel_download("1").unwrap();
        let (_, second) = m.cancel_download("1").unwrap();
        assert_eq!(first, CancelOutcome::Signalled);
        assert_eq!(second, CancelOutcome::AlreadyFinished);
        assert!(d.snapshot().is_cancelled);
    }

    #[test]
    fn test_resume() {
        let m = manager();
        m.add_previous_download(video(1)).unwrap();
        m.add_new_download(video(2)).unwrap();

        let d = m.on_resume_download("1").unwrap();
        assert_eq!(d.status(), DownloadStatus::Pending);

        assert!(matches!(
            m.on_resume_download("2").unwrap_err(),
            Error::InvalidStateTransition { .. }
        ));
        assert!(matches!(
            m.on_resume_download("3").unwrap_err(),
            Error::NotFound { .. }
        ));
    }

    #[test]
    fn test_snapshots_sorted_and_truncated() {
        let m = manager();
        for (id, started) in [(1, 100), (2, 300), (3, 200)] {
            let d = m.add_new_download(video(id)).unwrap();
            d.set_time_started(started);
        }
        let started: Vec<i64> = m.snapshots().iter().map(|s| s.time_started).collect();
        assert_eq!(started, vec![300, 200, 100]);

        for id in 10..30 {
            m.add_new_download(video(id)).unwrap();
        }
        assert_eq!(m.snapshots().len(), 10);
    }

    #[test]
    fn test_evict_finished_only_removes_old_terminal_entries() {
        let m = manager();
        let old = m.add_new_download(video(1)).unwrap();
        old.begin().unwrap();
        old.fail("boom");
        old.detach();
        old.set_time_completed(now_secs() - 7200);

        let rolling_back = m.add_new_download(video(4)).unwrap();
        rolling_back.begin().unwrap();
        rolling_back.fail("boom");
        rolling_back.set_time_completed(now_secs() - 7200);

        let recent = m.add_new_download(video(2)).unwrap();
        recent.begin().unwrap();
        recent.complete().unwrap();

        let running = m.add_new_download(video(3)).unwrap();
        running.begin().unwrap();
        running.set_time_started(now_secs() - 7200);

        let evicted = m.evict_finished(Duration::from_secs(3600));

        assert_eq!(evicted, 1);
        assert!(m.get_download("1").is_none());
        assert!(m.get_download("2").is_some());
        assert!(m.get_download("3").is_some());
        assert!(m.get_download("4").is_some());
    }

    #[test]
    fn test_shutdown_fires_download_tokens() {
        let m = manager();
        let d = m.add_new_download(video(1)).unwrap();
        d.begin().unwrap();

        m.shutdown();

        assert!(m.is_shutting_down());
        assert!(d.cancel_token().is_cancelled());
        assert!(!d.is_user_cancelled());
    }
}

//! A single tracked download and its state machine.
//!
//! ```text
//! Pending ──begin──▶ Running ──complete──▶ Completed
//!    ▲                  │  └────fail─────▶ Errored
//!    │ resume           └─────cancel─────▶ Cancelled
//! Paused ───────────────────cancel───────▶ Cancelled
//! ```

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::database::models::VideoDbModel;
use crate::database::time::now_secs;
use crate::notification::DownloadStatusSnapshot;
use crate::{Error, Result};

/// Lifecycle state of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DownloadStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Errored,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A worker owns the download and will clean up after itself.
    Signalled,
    /// Nothing is running; the caller must clean up.
    Detached,
    /// The download had already finished; nothing changed.
    AlreadyFinished,
}

#[derive(Debug)]
struct DownloadState {
    status: DownloadStatus,
    time_started: i64,
    time_completed: i64,
    progress: u8,
    speed: String,
    error_msg: Option<String>,
    /// Whether a worker task (or a cancelling caller) still owns the
    /// download, including its rollback.
    attached: bool,
}

/// One in-flight or recently finished download, keyed by video id.
#[derive(Debug)]
pub struct Download {
    key: String,
    video: RwLock<VideoDbModel>,
    state: Mutex<DownloadState>,
    cancel_token: CancellationToken,
}

impl Download {
    /// A fresh download about to start.
    pub fn new(video: VideoDbModel, cancel_token: CancellationToken) -> Self {
        Self::with_status(video, cancel_token, DownloadStatus::Pending)
    }

    /// A download interrupted by a previous run, waiting to be resumed.
    pub fn paused(video: VideoDbModel, cancel_token: CancellationToken) -> Self {
        Self::with_status(video, cancel_token, DownloadStatus::Paused)
    }

    fn with_status(
        video: VideoDbModel,
        cancel_token: CancellationToken,
        status: DownloadStatus,
    ) -> Self {
        Self {
            key: video.download_key(),
            video: RwLock::new(video),
            state: Mutex::new(DownloadState {
                status,
                time_started: now_secs(),
                time_completed: 0,
                progress: 0,
                speed: String::new(),
                error_msg: None,
                attached: false,
            }),
            cancel_token,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Working copy of the video record.
    pub fn video(&self) -> VideoDbModel {
        self.video.read().clone()
    }

    pub fn update_video(&self, f: impl FnOnce(&mut VideoDbModel)) {
        f(&mut self.video.write());
    }

    /// Token fired by `cancel` or by manager shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn status(&self) -> DownloadStatus {
        self.state.lock().status
    }

    pub fn progress(&self) -> (u8, String) {
        let state = self.state.lock();
        (state.progress, state.speed.clone())
    }

    pub fn error_msg(&self) -> Option<String> {
        self.state.lock().error_msg.clone()
    }

    /// Unix seconds of completion, once terminal.
    pub fn finished_at(&self) -> Option<i64> {
        let state = self.state.lock();
        state.status.is_terminal().then_some(state.time_completed)
    }

    /// Terminal with nobody left holding it, so the key may be reused.
    pub fn is_settled(&self) -> bool {
        let state = self.state.lock();
        state.status.is_terminal() && !state.attached
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// Pending → Running; the caller becomes the attached worker.
    pub fn begin(&self) -> Result<()> {
        let mut state = self.state.lock();
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if state.status != DownloadStatus::Pending {
            return Err(Error::InvalidStateTransition {
                from: state.status.to_string(),
                to: DownloadStatus::Running.to_string(),
            });
        }
        state.status = DownloadStatus::Running;
        state.time_started = now_secs();
        state.attached = true;
        Ok(())
    }

    /// Record progress; ignored unless running.
    pub fn update_progress(&self, percent: u8, speed: impl Into<String>) {
        let mut state = self.state.lock();
        if state.status == DownloadStatus::Running {
            state.progress = percent.min(100);
            state.speed = speed.into();
        }
    }

    /// Running → Completed. Fails with `Cancelled` if a cancel won the race.
    pub fn complete(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status == DownloadStatus::Cancelled || self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if state.status != DownloadStatus::Running {
            return Err(Error::InvalidStateTransition {
                from: state.status.to_string(),
                to: DownloadStatus::Completed.to_string(),
            });
        }
        state.status = DownloadStatus::Completed;
        state.progress = 100;
        state.time_completed = now_secs();
        state.attached = false;
        Ok(())
    }

    /// Move to Errored unless already terminal. The worker stays attached
    /// until it has rolled back and calls `detach`.
    pub fn fail(&self, msg: impl Into<String>) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }
        state.status = DownloadStatus::Errored;
        state.error_msg = Some(msg.into());
        state.time_completed = now_secs();
    }

    /// Request cancellation. Safe to call any number of times in any state.
    ///
    /// On `Detached` the caller takes over the cleanup and must `detach`
    /// once it is done.
    pub fn cancel(&self) -> CancelOutcome {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return CancelOutcome::AlreadyFinished;
        }
        state.status = DownloadStatus::Cancelled;
        state.time_completed = now_secs();
        self.cancel_token.cancel();
        if state.attached {
            CancelOutcome::Signalled
        } else {
            state.attached = true;
            CancelOutcome::Detached
        }
    }

    /// Whether the user cancelled, as opposed to the manager shutting down.
    pub fn is_user_cancelled(&self) -> bool {
        self.status() == DownloadStatus::Cancelled
    }

    /// Paused → Pending, ready for a worker to `begin` again.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status != DownloadStatus::Paused {
            return Err(Error::InvalidStateTransition {
                from: state.status.to_string(),
                to: DownloadStatus::Pending.to_string(),
            });
        }
        state.status = DownloadStatus::Pending;
        state.progress = 0;
        state.speed.clear();
        Ok(())
    }

    /// The owner has finished with this download, rollback included.
    pub fn detach(&self) {
        self.state.lock().attached = false;
    }

    pub fn snapshot(&self) -> DownloadStatusSnapshot {
        let video = self.video.read();
        let state = self.state.lock();
        DownloadStatusSnapshot {
            time_started: state.time_started,
            time_completed: state.time_completed,
            video_id: video.id,
            is_complete: state.status == DownloadStatus::Completed,
            is_cancelled: state.status == DownloadStatus::Cancelled,
            is_error: state.status == DownloadStatus::Errored,
            is_paused: state.status == DownloadStatus::Paused,
            url: video.url.clone().unwrap_or_default(),
            title: video.title.clone(),
            progress: state.progress,
            speed: state.speed.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_time_started(&self, secs: i64) {
        self.state.lock().time_started = secs;
    }

    #[cfg(test)]
    pub(crate) fn set_time_completed(&self, secs: i64) {
        self.state.lock().time_completed = secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: i64) -> VideoDbModel {
        let mut video = VideoDbModel::pending_download(
            "https://example.com/v1",
            "abcdef012345",
            "Title",
            "",
            None,
        );
        video.id = id;
        video
    }

    fn download() -> Download {
        Download::new(video(1), CancellationToken::new())
    }

    #[test]
    fn test_happy_path() {
        let d = download();
        assert_eq!(d.key(), "1");
        d.begin().unwrap();
        d.update_progress(45, "1.2MiB/s");
        assert_eq!(d.progress(), (45, "1.2MiB/s".to_string()));

        d.complete().unwrap();
        let snap = d.snapshot();
        assert!(snap.is_complete);
        assert_eq!(snap.progress, 100);
        assert!(snap.time_completed > 0);
        assert!(d.finished_at().is_some());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let d = download();
        d.begin().unwrap();

        assert_eq!(d.cancel(), CancelOutcome::Signalled);
        assert!(d.cancel_token().is_cancelled());
        assert_eq!(d.cancel(), CancelOutcome::AlreadyFinished);
        assert_eq!(d.cancel(), CancelOutcome::AlreadyFinished);
        assert!(d.snapshot().is_cancelled);
        assert!(d.is_user_cancelled());
    }

    #[test]
    fn test_cancel_before_worker_is_detached() {
        let d = Download::paused(video(2), CancellationToken::new());
        assert_eq!(d.cancel(), CancelOutcome::Detached);
        assert!(d.begin().is_err());

        // The cancelling caller owns the cleanup until it detaches.
        assert!(!d.is_settled());
        d.detach();
        assert!(d.is_settled());
    }

    #[test]
    fn test_terminal_worker_settles_only_after_detach() {
        let cancelled = download();
        cancelled.begin().unwrap();
        cancelled.cancel();
        assert!(cancelled.finished_at().is_some());
        assert!(!cancelled.is_settled());
        cancelled.detach();
        assert!(cancelled.is_settled());

        let failed = download();
        failed.begin().unwrap();
        failed.fail("boom");
        assert!(failed.is_attached());
        assert!(!failed.is_settled());
        failed.detach();
        assert!(failed.is_settled());

        let completed = download();
        completed.begin().unwrap();
        completed.complete().unwrap();
        assert!(completed.is_settled());
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let d = download();
        d.begin().unwrap();
        d.complete().unwrap();

        assert_eq!(d.cancel(), CancelOutcome::AlreadyFinished);
        assert!(!d.cancel_token().is_cancelled());
        assert!(d.snapshot().is_complete);
    }

    #[test]
    fn test_complete_loses_to_cancel() {
        let d = download();
        d.begin().unwrap();
        d.cancel();
        assert!(d.complete().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_shutdown_token_is_not_user_cancel() {
        let parent = CancellationToken::new();
        let d = Download::new(video(3), parent.child_token());
        d.begin().unwrap();
        parent.cancel();

        assert!(d.complete().unwrap_err().is_cancelled());
        assert!(!d.is_user_cancelled());
        assert_eq!(d.status(), DownloadStatus::Running);
    }

    #[test]
    fn test_fail_keeps_first_terminal_state() {
        let d = download();
        d.begin().unwrap();
        d.fail("boom");
        d.fail("again");
        assert_eq!(d.status(), DownloadStatus::Errored);
        assert_eq!(d.error_msg().as_deref(), Some("boom"));
        assert!(d.snapshot().is_error);
    }

    #[test]
    fn test_resume_transitions() {
        let d = Download::paused(video(4), CancellationToken::new());
        assert!(d.snapshot().is_paused);
        d.resume().unwrap();
        assert_eq!(d.status(), DownloadStatus::Pending);

        let err = d.resume().unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        d.begin().unwrap();
        assert_eq!(d.status(), DownloadStatus::Running);
    }

    #[test]
    fn test_progress_ignored_when_not_running() {
        let d = Download::paused(video(5), CancellationToken::new());
        d.update_progress(50, "1MiB/s");
        assert_eq!(d.progress().0, 0);
    }
}

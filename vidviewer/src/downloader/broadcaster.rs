//! Batching rule for the periodic download status broadcast.

use crate::notification::DownloadStatusSnapshot;

/// Newest first (ties broken by video id), at most `limit` entries.
pub fn order_batch(
    mut snapshots: Vec<DownloadStatusSnapshot>,
    limit: usize,
) -> Vec<DownloadStatusSnapshot> {
    snapshots.sort_by(|a, b| {
        b.time_started
            .cmp(&a.time_started)
            .then_with(|| b.video_id.cmp(&a.video_id))
    });
    snapshots.truncate(limit);
    snapshots
}

/// Decides, tick by tick, whether a status batch goes out.
///
/// A batch is emitted when the *previous* tick saw an active download, so
/// the tick on which the last download finishes is still broadcast and the
/// one after it is suppressed.
#[derive(Debug)]
pub struct StatusTicker {
    prev_is_update: bool,
    limit: usize,
}

impl StatusTicker {
    pub fn new(limit: usize) -> Self {
        Self {
            prev_is_update: true,
            limit,
        }
    }

    /// Feed the current snapshots; returns the batch to send, if any.
    pub fn tick(
        &mut self,
        snapshots: Vec<DownloadStatusSnapshot>,
    ) -> Option<Vec<DownloadStatusSnapshot>> {
        let is_update = snapshots.iter().any(DownloadStatusSnapshot::is_active);
        let batch = self
            .prev_is_update
            .then(|| order_batch(snapshots, self.limit));
        self.prev_is_update = is_update;
        batch
    }
}

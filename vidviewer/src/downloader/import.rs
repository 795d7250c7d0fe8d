//! Import of existing video files from a local folder.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::engine::MediaProbe;
use crate::database::models::{VideoDbModel, VideoLookupField};
use crate::database::repositories::VideoRepository;
use crate::files::{FileStore, IMAGE_EXT};
use crate::notification::{HubMessage, NotificationHub, notify};
use crate::utils::checksum::md5_file;
use crate::utils::file_id::generate_file_id;
use crate::utils::fs::io_error;
use crate::{Error, Result};

/// Extensions picked up by an import.
pub const IMPORT_EXTENSIONS: &[&str] = &["mp4", "webm"];

/// Counts of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Video files directly inside `folder`, sorted by path.
pub async fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| io_error("reading import folder", folder, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error("reading import folder", folder, e))?
    {
        let path = entry.path();
        if path.is_file() && import_extension(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn import_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMPORT_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Copy every new video in `folder` into the library and link it to
/// `playlist_id`. Files whose checksum is already known are skipped.
pub async fn import_from_disk(
    folder: &Path,
    playlist_id: i64,
    videos: &dyn VideoRepository,
    probe: &dyn MediaProbe,
    store: &FileStore,
    hub: Option<&NotificationHub>,
) -> Result<ImportReport> {
    let paths = scan_folder(folder).await?;
    if paths.is_empty() {
        return Err(Error::validation(
            "folder does not contain .mp4 or .webm files",
        ));
    }
    store.initialize().await?;

    let mut report = ImportReport::default();
    for path in paths {
        match import_file(&path, playlist_id, videos, probe, store).await {
            Ok(true) => {
                report.imported += 1;
                notify(hub, HubMessage::VideoDownloadSuccess);
            }
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to import video");
                report.skipped += 1;
            }
        }
    }

    info!(
        folder = %folder.display(),
        imported = report.imported,
        skipped = report.skipped,
        "Import finished"
    );
    Ok(report)
}

/// Import one file. `Ok(false)` means it was already in the library.
async fn import_file(
    path: &Path,
    playlist_id: i64,
    videos: &dyn VideoRepository,
    probe: &dyn MediaProbe,
    store: &FileStore,
) -> Result<bool> {
    let checksum = md5_file(path).await?;
    if videos
        .get_by(VideoLookupField::Md5Checksum, &checksum)
        .await?
        .is_some()
    {
        debug!(path = %path.display(), "Video already in library, skipping");
        return Ok(false);
    }

    let ext = import_extension(path).unwrap_or_default();
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut video = VideoDbModel::imported(generate_file_id(), &ext, title, checksum);
    match probe.video_duration(path).await {
        Ok(duration) => video.duration = duration,
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to probe duration"),
    }

    let id = videos.create_in_playlist(&video, playlist_id).await?;

    let destination = store.file_path(&video.file_id, &ext);
    let copied = async {
        store.create_file_folders(&video.file_id).await?;
        store.copy_file(path, &destination).await
    }
    .await;
    if let Err(e) = copied {
        if let Err(rollback) = videos.delete_with_associations(id).await {
            warn!(video_id = id, error = %rollback, "Failed to roll back imported video");
        }
        store.discard_download(&video.file_id, &ext).await;
        return Err(e);
    }

    let thumbnail = store.file_path(&video.file_id, IMAGE_EXT);
    if let Err(e) = probe.extract_thumbnail(&destination, &thumbnail).await {
        warn!(video_id = id, error = %e, "Failed to create thumbnail");
    }

    info!(video_id = id, path = %path.display(), "Imported video");
    Ok(true)
}

//! On-disk layout of the video library.
//!
//! ```text
//! root/
//!   temp/                      downloads in flight
//!   files/ab/cd/ef/abcdef0123456789.mp4
//!   files/ab/cd/ef/abcdef0123456789.jpg
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::utils::file_id::is_valid_file_id;
use crate::utils::fs::{self, io_error};
use crate::{Error, Result};

/// Directory holding finished videos and thumbnails.
pub const FILES_DIR: &str = "files";
/// Directory holding downloads in flight.
pub const TEMP_DIR: &str = "temp";
/// Thumbnail extension.
pub const IMAGE_EXT: &str = "jpg";

/// Number of two-character shard levels.
const SHARD_LEVELS: usize = 3;

/// Maps file ids to paths under a library root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check the root exists and create `files/` and `temp/` under it.
    pub async fn initialize(&self) -> Result<()> {
        if !fs::is_dir(&self.root).await {
            return Err(Error::RootFolderMissing(self.root.display().to_string()));
        }
        fs::ensure_dir_all_with_op("creating files directory", &self.files_dir()).await?;
        fs::ensure_dir_all_with_op("creating temp directory", &self.temp_dir()).await?;
        Ok(())
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Shard folder for a file id: `files/ab/cd/ef`.
    pub fn file_folder(&self, file_id: &str) -> PathBuf {
        let mut dir = self.files_dir();
        for level in 0..SHARD_LEVELS {
            let start = level * 2;
            dir.push(file_id.get(start..start + 2).unwrap_or("_"));
        }
        dir
    }

    /// Final location of a file with the given extension.
    pub fn file_path(&self, file_id: &str, ext: &str) -> PathBuf {
        self.file_folder(file_id).join(format!("{file_id}.{ext}"))
    }

    /// Create the shard folder for a file id.
    pub async fn create_file_folders(&self, file_id: &str) -> Result<PathBuf> {
        let dir = self.file_folder(file_id);
        fs::ensure_dir_all_with_op("creating file folders", &dir).await?;
        Ok(dir)
    }

    /// Move a file, falling back to copy + remove across filesystems.
    pub async fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        match tokio::fs::rename(src, dst).await {
            Ok(()) => Ok(()),
            Err(e) if src.exists() => {
                debug!(src = %src.display(), error = %e, "Rename failed, copying instead");
                tokio::fs::copy(src, dst)
                    .await
                    .map_err(|e| io_error("copying file", dst, e))?;
                tokio::fs::remove_file(src)
                    .await
                    .map_err(|e| io_error("removing file", src, e))
            }
            Err(e) => Err(io_error("moving file", src, e)),
        }
    }

    pub async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        tokio::fs::copy(src, dst)
            .await
            .map(|_| ())
            .map_err(|e| io_error("copying file", src, e))
    }

    /// Recursively delete files under `dir` whose name starts with `prefix`.
    ///
    /// Directories are never removed. Returns the number of files deleted.
    pub async fn delete_files_with_prefix(&self, dir: &Path, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error("reading directory", &current, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error("reading directory", &current, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error("reading file type", &path, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if entry.file_name().to_string_lossy().starts_with(prefix)
                    && fs::remove_file_if_exists(&path).await?
                {
                    deleted += 1;
                }
            }
        }

        Ok(deleted)
    }

    /// Remove a video and its thumbnail, then prune empty shard folders.
    ///
    /// Missing files are not an error. Ids outside the file id charset are
    /// rejected before anything is touched.
    pub async fn delete_video_files(
        &self,
        file_id: &str,
        video_ext: &str,
        image_ext: &str,
    ) -> Result<()> {
        if !is_valid_file_id(file_id) {
            return Err(Error::validation(format!("Invalid file id '{}'", file_id)));
        }
        fs::remove_file_if_exists(&self.file_path(file_id, video_ext)).await?;
        fs::remove_file_if_exists(&self.file_path(file_id, image_ext)).await?;

        let files_dir = self.files_dir();
        let mut dir = self.file_folder(file_id);
        while dir != files_dir && dir.starts_with(&files_dir) {
            // Fails when the folder still has entries, which ends the walk.
            if tokio::fs::remove_dir(&dir).await.is_err() {
                break;
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(())
    }

    /// Best-effort cleanup of everything a download may have produced.
    pub async fn discard_download(&self, file_id: &str, video_ext: &str) {
        if let Err(e) = self
            .delete_files_with_prefix(&self.temp_dir(), file_id)
            .await
        {
            warn!(file_id = %file_id, error = %e, "Failed to delete temp files");
        }
        if let Err(e) = self.delete_video_files(file_id, video_ext, IMAGE_EXT).await {
            warn!(file_id = %file_id, error = %e, "Failed to delete video files");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharded_path() {
        let store = FileStore::new("/lib");
        assert_eq!(
            store.file_path("abcdef012345", "mp4"),
            PathBuf::from("/lib/files/ab/cd/ef/abcdef012345.mp4")
        );
        assert_eq!(store.temp_dir(), PathBuf::from("/lib/temp"));
    }

    #[tokio::test]
    async fn test_initialize_requires_root() {
        let store = FileStore::new("/no/such/root/for/vidviewer");
        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, Error::RootFolderMissing(_)));

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();
        assert!(store.files_dir().is_dir());
        assert!(store.temp_dir().is_dir());
    }

    #[tokio::test]
    async fn test_delete_files_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        let temp = store.temp_dir();
        let nested = temp.join("abc123def456.parts");
        tokio::fs::create_dir(&nested).await.unwrap();
        for path in [
            temp.join("abc123def456.mp4.part"),
            temp.join("abc123def456.jpg"),
            nested.join("abc123def456.frag1"),
            temp.join("other.mp4"),
        ] {
            tokio::fs::write(&path, b"x").await.unwrap();
        }

        let deleted = store
            .delete_files_with_prefix(&temp, "abc123def456")
            .await
            .unwrap();

        assert_eq!(deleted, 3);
        assert!(temp.join("other.mp4").exists());
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_move_and_delete_video_files_prunes_shards() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.initialize().await.unwrap();

        let file_id = "0123456789ab";
        let src = store.temp_dir().join(format!("{file_id}.mp4"));
        tokio::fs::write(&src, b"video").await.unwrap();

        store.create_file_folders(file_id).await.unwrap();
        let dst = store.file_path(file_id, "mp4");
        store.move_file(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert!(dst.exists());

        store.delete_video_files(file_id, "mp4", IMAGE_EXT).await.unwrap();
        assert!(!dst.exists());
        assert!(!store.files_dir().join("01").exists());

        let err = store
            .delete_video_files("../../etc", "mp4", IMAGE_EXT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.files_dir().is_dir());
    }
}

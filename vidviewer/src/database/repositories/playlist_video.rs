//! Playlist/video association repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;

/// Repository for the `playlist_videos` join table.
#[async_trait]
pub trait PlaylistVideoRepository: Send + Sync {
    /// Link a video to a playlist; linking twice is a no-op.
    async fn create(&self, playlist_id: i64, video_id: i64) -> Result<()>;
    async fn delete(&self, playlist_id: i64, video_id: i64) -> Result<()>;
    async fn delete_for_video(&self, video_id: i64) -> Result<()>;
    async fn delete_for_playlist(&self, playlist_id: i64) -> Result<()>;
}

/// SQLx implementation of PlaylistVideoRepository.
pub struct SqlxPlaylistVideoRepository {
    pool: SqlitePool,
}

impl SqlxPlaylistVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistVideoRepository for SqlxPlaylistVideoRepository {
    async fn create(&self, playlist_id: i64, video_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id) VALUES (?, ?)")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, playlist_id: i64, video_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_for_video(&self, video_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM playlist_videos WHERE video_id = ?")
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_for_playlist(&self, playlist_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

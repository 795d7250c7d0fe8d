//! Playlist repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::PlaylistDbModel;
use crate::database::time::now_library_date;
use crate::{Error, Result};

/// Playlist repository trait.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// All playlists, led by the virtual "All" playlist.
    async fn list(&self) -> Result<Vec<PlaylistDbModel>>;
    async fn get(&self, id: i64) -> Result<PlaylistDbModel>;
    async fn create(&self, name: &str) -> Result<PlaylistDbModel>;
    async fn rename(&self, id: i64, name: &str) -> Result<()>;
    /// Remove a playlist and its video links in one transaction.
    async fn delete(&self, id: i64) -> Result<()>;
    async fn list_for_video(&self, video_id: i64) -> Result<Vec<PlaylistDbModel>>;
}

/// SQLx implementation of PlaylistRepository.
pub struct SqlxPlaylistRepository {
    pool: SqlitePool,
}

impl SqlxPlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlxPlaylistRepository {
    async fn list(&self) -> Result<Vec<PlaylistDbModel>> {
        let stored =
            sqlx::query_as::<_, PlaylistDbModel>("SELECT * FROM playlists ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut playlists = Vec::with_capacity(stored.len() + 1);
        playlists.push(PlaylistDbModel::all());
        playlists.extend(stored);
        Ok(playlists)
    }

    async fn get(&self, id: i64) -> Result<PlaylistDbModel> {
        sqlx::query_as::<_, PlaylistDbModel>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Playlist", id.to_string()))
    }

    async fn create(&self, name: &str) -> Result<PlaylistDbModel> {
        let date = now_library_date();
        let id = sqlx::query("INSERT INTO playlists (name, date) VALUES (?, ?)")
            .bind(name)
            .bind(&date)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(PlaylistDbModel {
            id,
            name: name.to_string(),
            date,
        })
    }

    async fn rename(&self, id: i64, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE playlists SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Playlist", id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::not_found("Playlist", id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_video(&self, video_id: i64) -> Result<Vec<PlaylistDbModel>> {
        let playlists = sqlx::query_as::<_, PlaylistDbModel>(
            r#"
            SELECT p.* FROM playlists AS p
            JOIN playlist_videos AS pv ON p.id = pv.playlist_id
            WHERE pv.video_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(playlists)
    }
}

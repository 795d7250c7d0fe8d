//! Video repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{ALL_PLAYLIST_ID, PlaylistVideoQuery, VideoDbModel, VideoLookupField};
use crate::{Error, Result};

/// Video repository trait.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<VideoDbModel>;
    async fn get_by(&self, field: VideoLookupField, value: &str) -> Result<Option<VideoDbModel>>;
    /// Videos whose download never completed, oldest first.
    async fn get_incomplete_downloads(&self) -> Result<Vec<VideoDbModel>>;
    async fn get_from_playlist(&self, query: &PlaylistVideoQuery) -> Result<Vec<VideoDbModel>>;
    async fn create(&self, video: &VideoDbModel) -> Result<i64>;
    /// Insert a video and link it to a playlist in one transaction.
    async fn create_in_playlist(&self, video: &VideoDbModel, playlist_id: i64) -> Result<i64>;
    async fn update(&self, video: &VideoDbModel) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Remove a video and every playlist link to it in one transaction.
    async fn delete_with_associations(&self, id: i64) -> Result<()>;
}

/// SQLx implementation of VideoRepository.
pub struct SqlxVideoRepository {
    pool: SqlitePool,
}

impl SqlxVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const INSERT_VIDEO: &str = r#"
    INSERT INTO videos (url, file_id, file_format, title, duration, download_complete,
                        download_date, md5_checksum, video_format)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl VideoRepository for SqlxVideoRepository {
    async fn get(&self, id: i64) -> Result<VideoDbModel> {
        sqlx::query_as::<_, VideoDbModel>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Video", id.to_string()))
    }

    async fn get_by(&self, field: VideoLookupField, value: &str) -> Result<Option<VideoDbModel>> {
        let sql = format!("SELECT * FROM videos WHERE {} = ? LIMIT 1", field.column());
        let video = sqlx::query_as::<_, VideoDbModel>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn get_incomplete_downloads(&self) -> Result<Vec<VideoDbModel>> {
        let videos = sqlx::query_as::<_, VideoDbModel>(
            "SELECT * FROM videos WHERE download_complete = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn get_from_playlist(&self, query: &PlaylistVideoQuery) -> Result<Vec<VideoDbModel>> {
        let order = query.sort.as_sql();
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let mut sql = String::from("SELECT v.* FROM videos AS v");
        if query.playlist_id != ALL_PLAYLIST_ID {
            sql.push_str(" JOIN playlist_videos AS pv ON v.id = pv.video_id");
        }
        sql.push_str(" WHERE v.download_complete = 1");
        if query.playlist_id != ALL_PLAYLIST_ID {
            sql.push_str(" AND pv.playlist_id = ?");
        }
        if pattern.is_some() {
            sql.push_str(" AND v.title LIKE ?");
        }
        sql.push_str(&format!(
            " ORDER BY v.download_date {order}, v.id {order} LIMIT ? OFFSET ?"
        ));

        let mut q = sqlx::query_as::<_, VideoDbModel>(&sql);
        if query.playlist_id != ALL_PLAYLIST_ID {
            q = q.bind(query.playlist_id);
        }
        if let Some(pattern) = pattern {
            q = q.bind(pattern);
        }
        let videos = q
            .bind(i64::from(query.limit))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn create(&self, video: &VideoDbModel) -> Result<i64> {
        let result = bind_video(sqlx::query(INSERT_VIDEO), video)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn create_in_playlist(&self, video: &VideoDbModel, playlist_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let id = bind_video(sqlx::query(INSERT_VIDEO), video)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        sqlx::query("INSERT INTO playlist_videos (playlist_id, video_id) VALUES (?, ?)")
            .bind(playlist_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn update(&self, video: &VideoDbModel) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE videos SET
                url = ?,
                file_id = ?,
                file_format = ?,
                title = ?,
                duration = ?,
                download_complete = ?,
                download_date = ?,
                md5_checksum = ?,
                video_format = ?
            WHERE id = ?
            "#,
        )
        .bind(&video.url)
        .bind(&video.file_id)
        .bind(&video.file_format)
        .bind(&video.title)
        .bind(&video.duration)
        .bind(video.download_complete)
        .bind(&video.download_date)
        .bind(&video.md5_checksum)
        .bind(&video.video_format)
        .bind(video.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Video", video.id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_with_associations(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_videos WHERE video_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn bind_video<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    video: &'q VideoDbModel,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&video.url)
        .bind(&video.file_id)
        .bind(&video.file_format)
        .bind(&video.title)
        .bind(&video.duration)
        .bind(video.download_complete)
        .bind(&video.download_date)
        .bind(&video.md5_checksum)
        .bind(&video.video_format)
}

//! Video routes: create, stream, retitle, delete and list formats.

use std::path::Path as FsPath;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::services::ServeFile;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    FormatsQuery, NewVideoRequest, UpdateVideoRequest, VideoCreatedResponse, VideoSource,
    is_valid_url,
};
use crate::api::server::AppState;
use crate::database::models::VideoDbModel;
use crate::downloader::engine::VideoFormat;
use crate::downloader::{SubmitRequest, import_from_disk};
use crate::error::Error;
use crate::files::IMAGE_EXT;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", post(create_video))
        .route(
            "/videos/{id}",
            get(get_video).put(update_video).delete(delete_video),
        )
        .route("/video_formats", get(list_video_formats))
}

/// Add videos from a local folder, or start a download from a URL.
async fn create_video(
    State(state): State<AppState>,
    Json(form): Json<NewVideoRequest>,
) -> ApiResult<Response> {
    let playlists = state
        .playlist_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;
    let orchestrator = state
        .orchestrator
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Download orchestrator not available"))?;

    let playlist_exists = if form.playlist_id >= 1 {
        match playlists.get(form.playlist_id).await {
            Ok(_) => true,
            Err(Error::NotFound { .. }) => false,
            Err(e) => return Err(e.into()),
        }
    } else {
        false
    };

    let source = form
        .validate(playlist_exists)
        .map_err(ApiError::validation_errors)?;
    let store = state.file_store()?;

    match source {
        VideoSource::Disk => {
            let videos = state
                .video_repository
                .clone()
                .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;
            let report = import_from_disk(
                FsPath::new(form.folder.trim()),
                form.playlist_id,
                videos.as_ref(),
                orchestrator.probe().as_ref(),
                &store,
                state.hub(),
            )
            .await?;
            info!(
                imported = report.imported,
                skipped = report.skipped,
                "Disk import finished"
            );
            Ok((StatusCode::CREATED, Json(report)).into_response())
        }
        VideoSource::YtDlp => {
            let request = SubmitRequest {
                url: form.url.trim().to_string(),
                playlist_id: form.playlist_id,
                video_format: form.format(),
            };
            let video_id = orchestrator.submit_url(request, &store).await?;
            Ok((StatusCode::ACCEPTED, Json(VideoCreatedResponse { video_id })).into_response())
        }
    }
}

/// Stream the video file. Range requests are honoured.
async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Request,
) -> ApiResult<Response> {
    let videos = state
        .video_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;

    let video = videos.get(id).await?;
    if !video.download_complete {
        return Err(ApiError::not_found(format!(
            "Video with id '{}' is still downloading",
            id
        )));
    }

    let path = state.file_store()?.file_path(&video.file_id, &video.file_format);
    if !path.is_file() {
        return Err(ApiError::not_found(format!("Video file not found: {}", id)));
    }

    match ServeFile::new(path).try_call(request).await {
        Ok(response) => Ok(response.into_response()),
        Err(e) => Err(ApiError::internal(format!("Failed to serve file: {}", e))),
    }
}

async fn update_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateVideoRequest>,
) -> ApiResult<Json<VideoDbModel>> {
    let videos = state
        .video_repository
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title cannot be blank"));
    }

    let mut video = videos.get(id).await?;
    video.title = title.to_string();
    videos.update(&video).await?;
    Ok(Json(video))
}

/// Delete a video with its playlist links and files.
///
/// A video whose download is still running or rolling back is cancelled
/// instead; the download cleans up after itself.
async fn delete_video(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let videos = state
        .video_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;
    let store = state.file_store()?;

    let video = videos.get(id).await?;
    let key = video.download_key();

    if let Some(orchestrator) = &state.orchestrator {
        let live = orchestrator
            .manager()
            .get_download(&key)
            .is_some_and(|d| !d.is_settled());
        if live {
            let outcome = orchestrator.cancel(&key, &store).await?;
            info!(video_id = id, ?outcome, "Deleted video was downloading, cancelled");
            return Ok(StatusCode::NO_CONTENT);
        }
        orchestrator.manager().remove_download(&key);
    }

    videos.delete_with_associations(id).await?;
    if let Err(e) = store
        .delete_video_files(&video.file_id, &video.file_format, IMAGE_EXT)
        .await
    {
        warn!(video_id = id, error = %e, "Failed to delete video files");
    }

    info!(video_id = id, "Video deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_video_formats(
    State(state): State<AppState>,
    Query(query): Query<FormatsQuery>,
) -> ApiResult<Json<Vec<VideoFormat>>> {
    let orchestrator = state
        .orchestrator
        .ok_or_else(|| ApiError::service_unavailable("Download orchestrator not available"))?;

    let url = query.url.trim();
    if !is_valid_url(url) {
        return Err(ApiError::validation("Invalid URL"));
    }

    Ok(Json(orchestrator.downloader().list_formats(url).await?))
}

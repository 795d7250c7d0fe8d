//! Playlist membership routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{PlaylistSummary, PlaylistVideoRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/playlist_videos",
            post(add_to_playlist).delete(remove_from_playlist),
        )
        .route("/video/{id}/playlists", get(list_video_playlists))
}

async fn add_to_playlist(
    State(state): State<AppState>,
    Json(request): Json<PlaylistVideoRequest>,
) -> ApiResult<StatusCode> {
    let playlists = state
        .playlist_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;
    let videos = state
        .video_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;
    let repo = state
        .playlist_video_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist video repository not available"))?;

    // Missing ends are a 404, not a constraint failure.
    playlists.get(request.playlist_id).await?;
    videos.get(request.video_id).await?;

    repo.create(request.playlist_id, request.video_id).await?;
    Ok(StatusCode::CREATED)
}

async fn remove_from_playlist(
    State(state): State<AppState>,
    Json(request): Json<PlaylistVideoRequest>,
) -> ApiResult<StatusCode> {
    let repo = state
        .playlist_video_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist video repository not available"))?;

    repo.delete(request.playlist_id, request.video_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_video_playlists(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<PlaylistSummary>>> {
    let repo = state
        .playlist_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;

    let playlists = repo
        .list_for_video(id)
        .await?
        .into_iter()
        .map(PlaylistSummary::from)
        .collect();
    Ok(Json(playlists))
}

//! Playlist routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{PlaylistRequest, PlaylistVideosQuery};
use crate::api::server::AppState;
use crate::database::models::{ALL_PLAYLIST_ID, PlaylistDbModel, VideoDbModel};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/playlists", get(list_playlists).post(create_playlist))
        .route("/playlists/{id}", put(rename_playlist).delete(delete_playlist))
        .route("/playlist/{id}/videos", get(list_playlist_videos))
}

fn playlist_name(request: &PlaylistRequest) -> ApiResult<&str> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name cannot be blank"));
    }
    Ok(name)
}

fn editable_id(id: i64) -> ApiResult<i64> {
    if id == ALL_PLAYLIST_ID {
        return Err(ApiError::bad_request("The All playlist cannot be modified"));
    }
    Ok(id)
}

async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Vec<PlaylistDbModel>>> {
    let repo = state
        .playlist_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;
    Ok(Json(repo.list().await?))
}

async fn create_playlist(
    State(state): State<AppState>,
    Json(request): Json<PlaylistRequest>,
) -> ApiResult<(StatusCode, Json<PlaylistDbModel>)> {
    let repo = state
        .playlist_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;

    let playlist = repo.create(playlist_name(&request)?).await?;
    info!(playlist_id = playlist.id, name = %playlist.name, "Playlist created");
    Ok((StatusCode::CREATED, Json(playlist)))
}

async fn rename_playlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PlaylistRequest>,
) -> ApiResult<Json<PlaylistDbModel>> {
    let repo = state
        .playlist_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;

    let id = editable_id(id)?;
    repo.rename(id, playlist_name(&request)?).await?;
    Ok(Json(repo.get(id).await?))
}

async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let repo = state
        .playlist_repository
        .ok_or_else(|| ApiError::service_unavailable("Playlist repository not available"))?;

    let id = editable_id(id)?;
    repo.delete(id).await?;
    info!(playlist_id = id, "Playlist deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Completed videos of a playlist, one page at a time. Id 0 lists all.
async fn list_playlist_videos(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PlaylistVideosQuery>,
) -> ApiResult<Json<Vec<VideoDbModel>>> {
    let repo = state
        .video_repository
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;

    let query = params.into_query(id);
    Ok(Json(repo.get_from_playlist(&query).await?))
}

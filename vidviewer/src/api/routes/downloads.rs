//! Download status, cancel and resume routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::notification::DownloadStatusSnapshot;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/downloads", get(list_downloads))
        .route(
            "/downloads/{video_id}",
            axum::routing::delete(cancel_download).patch(resume_download),
        )
}

/// The batch the broadcaster would send right now.
async fn list_downloads(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DownloadStatusSnapshot>>> {
    let manager = state
        .download_manager
        .ok_or_else(|| ApiError::service_unavailable("Download manager not available"))?;
    Ok(Json(manager.snapshots()))
}

/// Cancel a download. Cancelling a finished download is a no-op.
async fn cancel_download(
    State(state): State<AppState>,
    Path(video_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let orchestrator = state
        .orchestrator
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Download orchestrator not available"))?;
    let store = state.file_store()?;

    let outcome = orchestrator.cancel(&video_id.to_string(), &store).await?;
    info!(video_id, ?outcome, "Download cancel requested");
    Ok(StatusCode::NO_CONTENT)
}

/// Resume a paused download.
async fn resume_download(
    State(state): State<AppState>,
    Path(video_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let orchestrator = state
        .orchestrator
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Download orchestrator not available"))?;
    let store = state.file_store()?;

    orchestrator.resume_download(&video_id.to_string(), store)?;
    info!(video_id, "Download resumed");
    Ok(StatusCode::ACCEPTED)
}

//! Thumbnail route.

use axum::{
    Router,
    extract::{Path, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::services::ServeFile;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::files::IMAGE_EXT;

/// Thumbnails never change once written.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn router() -> Router<AppState> {
    Router::new().route("/images/{video_id}", get(get_image))
}

async fn get_image(
    State(state): State<AppState>,
    Path(video_id): Path<i64>,
    request: Request,
) -> ApiResult<Response> {
    let videos = state
        .video_repository
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Video repository not available"))?;

    let video = videos.get(video_id).await?;
    let path = state.file_store()?.file_path(&video.file_id, IMAGE_EXT);
    if !path.is_file() {
        return Err(ApiError::not_found(format!(
            "Thumbnail not found for video {}",
            video_id
        )));
    }

    let mut response = match ServeFile::new(path).try_call(request).await {
        Ok(response) => response.into_response(),
        Err(e) => return Err(ApiError::internal(format!("Failed to serve file: {}", e))),
    };
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMAGE_CACHE_CONTROL),
    );
    Ok(response)
}

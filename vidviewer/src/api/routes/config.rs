//! Library configuration routes.

use axum::{Json, Router, extract::State, routing::get};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::UpdateConfigRequest;
use crate::api::routes::CONFIG_PATH;
use crate::api::server::AppState;
use crate::config::LibraryConfig;
use crate::files::FileStore;

pub fn router() -> Router<AppState> {
    Router::new().route(CONFIG_PATH, get(get_config).put(update_config))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<LibraryConfig>> {
    let config_service = state
        .config_service
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Config service not available"))?;
    Ok(Json(config_service.get()))
}

/// Point the library at a new root folder and lay out its subfolders.
async fn update_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateConfigRequest>,
) -> ApiResult<Json<LibraryConfig>> {
    let config_service = state
        .config_service
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Config service not available"))?;

    let config = config_service
        .update_root_folder(&request.root_folder_path)
        .await?;

    if let Some(root) = config.root_folder() {
        FileStore::new(root).initialize().await?;
    }

    info!(folder_path = %config.folder_path, "Root folder updated");
    Ok(Json(config))
}

//! Logging API routes.
//!
//! Reads and replaces the live log filter.

use axum::{Json, Router, extract::State, routing::get};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LoggingConfigResponse, UpdateLogFilterRequest};
use crate::api::routes::LOGGING_PATH;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        LOGGING_PATH,
        get(get_logging_config).put(update_logging_config),
    )
}

async fn get_logging_config(
    State(state): State<AppState>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging_config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;

    Ok(Json(LoggingConfigResponse {
        filter: logging_config.get_filter(),
    }))
}

async fn update_logging_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging_config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))?;

    logging_config
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    info!(filter = %request.filter, "Log filter updated");

    Ok(Json(LoggingConfigResponse {
        filter: logging_config.get_filter(),
    }))
}

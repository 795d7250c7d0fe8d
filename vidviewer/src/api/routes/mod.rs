//! API route modules.
//!
//! Organizes routes by resource type. Paths match the library front end,
//! so modules declare full paths and are merged rather than nested.

pub mod config;
pub mod downloads;
pub mod images;
pub mod logging;
pub mod playlist_videos;
pub mod playlists;
pub mod videos;
pub mod websocket;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::api::middleware::{require_root_folder, require_tools};
use crate::api::server::AppState;

pub const WEBSOCKET_PATH: &str = "/websocket";
pub const CONFIG_PATH: &str = "/config";
pub const LOGGING_PATH: &str = "/logging";

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(websocket::router())
        .merge(config::router())
        .merge(logging::router())
        .merge(playlists::router())
        .merge(playlist_videos::router())
        .merge(videos::router())
        .merge(images::router())
        .merge(downloads::router())
        // Layers run outside-in: tools first, then the root folder.
        .layer(from_fn_with_state(state.clone(), require_root_folder))
        .layer(from_fn_with_state(state.clone(), require_tools))
        .with_state(state)
}

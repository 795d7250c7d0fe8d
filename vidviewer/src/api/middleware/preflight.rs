//! Tool and root-folder preflight middleware.
//!
//! Both checks broadcast a hub message before rejecting the request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::routes::{CONFIG_PATH, LOGGING_PATH, WEBSOCKET_PATH};
use crate::api::server::AppState;
use crate::error::{Error, ExternalTool};
use crate::notification::{HubMessage, notify};

/// Paths that stay reachable while the library is not usable.
fn is_exempt(path: &str) -> bool {
    [WEBSOCKET_PATH, CONFIG_PATH, LOGGING_PATH]
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Reject requests while `ffmpeg` or `yt-dlp` is missing.
pub async fn require_tools(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    if let Some(orchestrator) = &state.orchestrator {
        let missing = if !orchestrator.probe().is_available() {
            Some(ExternalTool::Ffmpeg)
        } else if !orchestrator.downloader().is_available() {
            Some(ExternalTool::YtDlp)
        } else {
            None
        };

        if let Some(tool) = missing {
            warn!(%tool, "External tool not found");
            notify(state.hub(), HubMessage::tool_not_found(tool));
            return Err(Error::ExternalToolNotFound(tool).into());
        }
    }

    Ok(next.run(request).await)
}

/// Reject requests while the library root is unset or unusable.
pub async fn require_root_folder(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let ready = match state.file_store() {
        Ok(store) => match store.initialize().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Root folder unusable");
                false
            }
        },
        Err(_) => false,
    };

    if !ready {
        notify(state.hub(), HubMessage::RootFolderNotFound);
        let path = state
            .config_service
            .as_ref()
            .map(|c| c.get().folder_path)
            .unwrap_or_default();
        return Err(Error::RootFolderMissing(path).into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/websocket"));
        assert!(is_exempt("/config"));
        assert!(is_exempt("/logging"));
        assert!(!is_exempt("/videos"));
        assert!(!is_exempt("/playlists"));
        assert!(!is_exempt("/downloads/3"));
    }
}

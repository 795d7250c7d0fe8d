//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes;
use crate::config::ConfigService;
use crate::database::repositories::{
    PlaylistRepository, PlaylistVideoRepository, VideoRepository,
};
use crate::downloader::{DownloadManager, DownloadOrchestrator};
use crate::error::{Error, Result};
use crate::files::FileStore;
use crate::logging::LoggingConfig;
use crate::notification::NotificationHub;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            body_limit: 1024 * 1024,
        }
    }
}

impl ApiServerConfig {
    /// Load API server config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `API_PORT` (e.g. "8000")
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(bind_address) = std::env::var("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("API_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            config.port = parsed;
        }

        config
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Library settings (root folder)
    pub config_service: Option<Arc<ConfigService>>,
    /// WebSocket fan-out
    pub notification_hub: Option<Arc<NotificationHub>>,
    /// Download manager
    pub download_manager: Option<Arc<DownloadManager>>,
    /// Download orchestration and the external tools behind it
    pub orchestrator: Option<Arc<DownloadOrchestrator>>,
    pub video_repository: Option<Arc<dyn VideoRepository>>,
    pub playlist_repository: Option<Arc<dyn PlaylistRepository>>,
    pub playlist_video_repository: Option<Arc<dyn PlaylistVideoRepository>>,
    /// Logging configuration for dynamic log level changes
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    /// Create a new application state without services.
    pub fn new() -> Self {
        Self {
            config_service: None,
            notification_hub: None,
            download_manager: None,
            orchestrator: None,
            video_repository: None,
            playlist_repository: None,
            playlist_video_repository: None,
            logging_config: None,
        }
    }

    pub fn with_config_service(mut self, config_service: Arc<ConfigService>) -> Self {
        self.config_service = Some(config_service);
        self
    }

    pub fn with_notification_hub(mut self, hub: Arc<NotificationHub>) -> Self {
        self.notification_hub = Some(hub);
        self
    }

    /// Attach the orchestrator together with the manager it drives.
    pub fn with_orchestrator(mut self, orchestrator: Arc<DownloadOrchestrator>) -> Self {
        self.download_manager = Some(orchestrator.manager().clone());
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_repositories(
        mut self,
        videos: Arc<dyn VideoRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        playlist_videos: Arc<dyn PlaylistVideoRepository>,
    ) -> Self {
        self.video_repository = Some(videos);
        self.playlist_repository = Some(playlists);
        self.playlist_video_repository = Some(playlist_videos);
        self
    }

    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// Hub for broadcasting, if one is attached.
    pub fn hub(&self) -> Option<&NotificationHub> {
        self.notification_hub.as_deref()
    }

    /// File store rooted at the configured library folder.
    pub fn file_store(&self) -> ApiResult<FileStore> {
        let config_service = self
            .config_service
            .as_ref()
            .ok_or_else(|| ApiError::service_unavailable("Config service not available"))?;
        match config_service.root_folder() {
            Some(root) => Ok(FileStore::new(root)),
            None => Err(Error::RootFolderMissing(String::new()).into()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(config: ApiServerConfig) -> Self {
        Self::with_state(config, AppState::new())
    }

    /// Create a new API server with custom state.
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.body_limit));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    // Upgraded sockets live for hours; keep them out of request spans.
                    if req.uri().path().starts_with(routes::WEBSOCKET_PATH) {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                ),
        )
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_app_state_creation() {
        let state = AppState::new();
        assert!(state.config_service.is_none());
        assert!(state.hub().is_none());
    }

    #[test]
    fn test_file_store_requires_root() {
        let state = AppState::new();
        let err = state.file_store().unwrap_err();
        assert_eq!(err.code, "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_file_store_without_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::load(dir.path().join("config.json"))
            .await
            .unwrap();
        let state = AppState::new().with_config_service(Arc::new(service));
        let err = state.file_store().unwrap_err();
        assert_eq!(err.code, "ROOT_FOLDER_NOT_FOUND");
    }

    #[test]
    fn test_server_creation() {
        let server = ApiServer::new(ApiServerConfig::default());
        let token = server.cancel_token();
        assert!(!token.is_cancelled());
        server.shutdown();
        assert!(token.is_cancelled());
    }
}

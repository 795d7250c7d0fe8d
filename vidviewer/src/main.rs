use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vidviewer::api::{ApiServer, ApiServerConfig, AppState};
use vidviewer::config::{AppSettings, ConfigService};
use vidviewer::database::{
    self,
    repositories::{SqlxPlaylistRepository, SqlxPlaylistVideoRepository, SqlxVideoRepository},
};
use vidviewer::downloader::engine::{Ffmpeg, MediaDownloader, MediaProbe, YtDlp};
use vidviewer::downloader::{DownloadManager, DownloadManagerConfig, DownloadOrchestrator};
use vidviewer::logging;
use vidviewer::notification::NotificationHub;
use vidviewer::utils::fs::ensure_dir_all;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let settings = AppSettings::from_env();

    // Initialize logging
    let (logging_config, _log_guard) = logging::init_logging(&settings.log_dir)?;
    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    // Initialize database
    ensure_dir_all(&settings.config_dir).await?;
    let pool = database::init_pool(&settings.database_url).await?;
    database::run_migrations(&pool).await?;

    let videos = Arc::new(SqlxVideoRepository::new(pool.clone()));
    let playlists = Arc::new(SqlxPlaylistRepository::new(pool.clone()));
    let playlist_videos = Arc::new(SqlxPlaylistVideoRepository::new(pool.clone()));

    // Download pipeline
    let hub = Arc::new(NotificationHub::new());
    let manager = Arc::new(DownloadManager::new(
        DownloadManagerConfig {
            process_timeout: settings.download_timeout,
            retention: settings.download_retention,
            ..Default::default()
        },
        Some(hub.clone()),
    ));
    let downloader: Arc<dyn MediaDownloader> = Arc::new(YtDlp::new(&settings.ytdlp_path));
    let probe: Arc<dyn MediaProbe> =
        Arc::new(Ffmpeg::new(&settings.ffmpeg_path, &settings.ffprobe_path));
    for (tool, available) in [
        (settings.ytdlp_path.as_str(), downloader.is_available()),
        (settings.ffmpeg_path.as_str(), probe.is_available()),
    ] {
        if !available {
            tracing::warn!(tool, "External tool not found; library routes will be rejected");
        }
    }

    let orchestrator = Arc::new(DownloadOrchestrator::new(
        manager.clone(),
        videos.clone(),
        downloader,
        probe,
    ));

    let config_service = Arc::new(ConfigService::load(settings.library_config_path()).await?);
    manager.initialize(videos.as_ref()).await?;

    let state = AppState::new()
        .with_config_service(config_service)
        .with_notification_hub(hub)
        .with_orchestrator(orchestrator)
        .with_repositories(videos, playlists, playlist_videos)
        .with_logging_config(logging_config);

    let server = ApiServer::with_state(ApiServerConfig::from_env_or_default(), state);
    let server_token = server.cancel_token();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
            server_token.cancel();
        }
    });

    tracing::info!("vidviewer initialized successfully");
    let result = server.run().await;

    // Interrupted downloads stay in the database and come back paused.
    manager.shutdown();
    shutdown.cancel();
    pool.close().await;

    result?;
    Ok(())
}

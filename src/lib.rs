pub mod api;
pub mod config;
pub mod downloader;
pub mod history;
pub mod settings;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;

use api::AppState;
use config::ServerConfig;
use downloader::backends::{PlayerClient, YouTubeStreamBackend, YtDlpBackend};
use downloader::{Downloader, JobTable, ToolManager};
use settings::SettingsStore;

/// Wire the backends, job table and settings into a downloader
pub fn build_downloader(config: &ServerConfig) -> anyhow::Result<Downloader> {
    let tools = ToolManager::new(config.ytdlp_bin.clone(), config.python_cmd.clone());
    let player = PlayerClient::new(config.youtube_api.clone())
        .map_err(|e| anyhow::anyhow!("creating YouTube client: {}", e))?;

    Ok(Downloader::new(
        Arc::new(YtDlpBackend::new(tools)),
        Arc::new(YouTubeStreamBackend::new(player)),
        JobTable::new(config.retention),
        SettingsStore::new(config.settings_file.clone(), &config.download_dir),
    ))
}

/// Serve the HTTP API until Ctrl+C, then drop pending evictions
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let downloader = build_downloader(&config)?;

    let settings = downloader.settings().load().await;
    tracing::info!("[server] settings file: {}", downloader.settings().path().display());
    tracing::info!("[server] download directory: {}", settings.download_path);

    if !downloader.external_available().await {
        tracing::warn!("[server] yt-dlp not found, YouTube falls back to direct streaming");
    }

    let state = AppState {
        downloader: downloader.clone(),
    };
    let app = api::router(state, config.static_dir.as_deref());

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("[server] media downloader listening on http://{}", addr);
    tracing::info!("[server] privacy-first: no tracking, local processing only");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    downloader.shutdown().await;
    tracing::info!("[server] stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("[server] failed to install Ctrl+C handler: {}", err);
    }
}

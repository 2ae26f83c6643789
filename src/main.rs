use tracing_subscriber::EnvFilter;

use media_downloader::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_downloader=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    media_downloader::run(config).await
}

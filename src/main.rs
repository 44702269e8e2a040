use disaster_alerts::config::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting disaster alert service..."
    );

    disaster_alerts::start_server(config).await
}

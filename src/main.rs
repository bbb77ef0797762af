use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wallet_sentinel::api::AppState;
use wallet_sentinel::config::Config;
use wallet_sentinel::monitor::spawn_monitor;
use wallet_sentinel::stream::connector::StreamConnector;
use wallet_sentinel::stream::replay::ReplayConnector;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=debug for per-event output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("Wallet Sentinel starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        wallet = %config.source.wallet_address,
        tokens = config.source.tokens.len(),
        "Configuration loaded from {}",
        config_path
    );

    let connector: Arc<dyn StreamConnector> = Arc::new(ReplayConnector::new(
        config.source.transactions_path.clone(),
        config.source.candles_path.clone(),
        Duration::from_millis(config.source.replay_delay_ms),
        config.source.channel_buffer,
    ));

    let shutdown = CancellationToken::new();
    let handles = spawn_monitor(connector.clone(), &config, shutdown.clone())?;

    // Spawn API server
    if config.api.enabled {
        let state = AppState::from_handles(&handles);
        let host = config.api.host.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = wallet_sentinel::api::serve(state, &host, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        });
    }

    tracing::info!("Monitor running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping streams...");
    shutdown.cancel();
    connector.disconnect();

    let feed = handles.feed.clone();
    handles.join().await;

    tracing::info!(
        anomalies = feed.total_published().unwrap_or_default(),
        "Wallet Sentinel stopped gracefully"
    );
    Ok(())
}

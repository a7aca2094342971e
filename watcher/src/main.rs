//! Auction Live Watcher binary.
//!
//! Entry point for the watcher that follows a live auction.

use anyhow::Context;
use auction_live_watcher::{WatcherConfig, WatcherService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,auction_live_sdk=debug,auction_live_watcher=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = WatcherConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    tracing::info!("Starting Auction Live Watcher");
    tracing::info!("Backend URL: {}", config.backend_url);
    tracing::info!("Backoff: {}", config.backoff);

    let service = WatcherService::new(config).context("failed to start session")?;
    let summary = service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("watcher failed")?;

    tracing::info!(
        "Final state: {}",
        serde_json::to_string(&summary).context("failed to encode summary")?
    );

    Ok(())
}

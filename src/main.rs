//! waitwatch daemon
//!
//! Run with: cargo run
//!
//! See `waitwatch::config` for the environment variables it reads.
//! RUST_LOG sets the log level (default: waitwatch=info).

use waitwatch::api::run_server;
use waitwatch::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waitwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env()?;

    tracing::info!("waitwatch configuration:");
    tracing::info!("  Status server: {}:{}", config.host, config.port);
    tracing::info!("  Node ID: {}", config.node_id);
    tracing::info!("  Tick interval: {:?}", config.tick_interval);
    tracing::info!("  Debounce interval: {:?}", config.debounce_interval);
    tracing::info!("  Lock TTL: {:?}", config.lock_ttl);
    tracing::info!("  Lock file: {}", config.lock_file.display());
    tracing::info!("  Wait times file: {}", config.wait_times_file.display());
    tracing::info!(
        "  Default threshold: {} seconds",
        config.thresholds.default_threshold
    );
    for (queue, seconds) in &config.thresholds.waits {
        if *seconds == 0 {
            tracing::info!("    - {}: monitoring disabled", queue);
        } else {
            tracing::info!("    - {}: {} seconds", queue, seconds);
        }
    }
    match &config.webhook_url {
        Some(url) => tracing::info!("  Webhook: {}", url),
        None => tracing::info!("  Webhook: DISABLED (alerts are logged only)"),
    }

    run_server(config).await
}

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, status, AppState};
use crate::config::MonitorConfig;
use crate::monitor::{
    ChannelSink, FanoutSink, FileLock, FileWaitTimeSource, LogSink, MonitorWorker,
    ThresholdPolicy, WaitTimeMonitor, WebhookNotifier,
};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Build the monitor described by `config`.
///
/// Daemons built from configs naming the same lock file share one run lock.
/// Returns the webhook notifier task when a webhook is configured; it runs
/// until the monitor (and with it the alert channel) is dropped.
pub fn build_monitor(
    config: &MonitorConfig,
) -> (WaitTimeMonitor, Option<tokio::task::JoinHandle<()>>) {
    let mut sink = FanoutSink::new().with_sink(LogSink);
    let mut webhook_handle = None;

    if let Some(url) = &config.webhook_url {
        let (channel, rx) = ChannelSink::channel();
        sink = sink.with_sink(channel);
        webhook_handle = Some(WebhookNotifier::new(url.clone()).start(rx));
    }

    let monitor = WaitTimeMonitor::new(
        FileWaitTimeSource::new(config.wait_times_file.clone()),
        FileLock::new(
            config.lock_file.clone(),
            config.lock_ttl,
            config.node_id.clone(),
        ),
        sink,
        ThresholdPolicy::new(config.thresholds.clone()),
    )
    .with_debounce_interval(config.debounce_interval);

    (monitor, webhook_handle)
}

/// Run the monitor worker and the status server
pub async fn run_server(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (monitor, webhook_handle) = build_monitor(&config);

    let worker = Arc::new(MonitorWorker::new(monitor, config.tick_interval));
    let worker_handle = Arc::clone(&worker).start();

    let state = Arc::new(AppState {
        worker: Arc::clone(&worker),
        node_id: config.node_id.clone(),
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting waitwatch status server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&worker)))
        .await?;

    worker_handle.abort();
    if let Some(handle) = webhook_handle {
        handle.abort();
    }

    tracing::info!("waitwatch stopped");
    Ok(())
}

async fn shutdown_signal(worker: Arc<MonitorWorker>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping monitor...");
    worker.stop();
}

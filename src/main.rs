//! Campfire - chat bridge between game server logs and a messaging platform
//!
//! Runs the synchronization engine against the configured management API and
//! OneBot endpoint until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use campfire::adapters::{DmpClient, HttpGateway, JsonlHistorySink, OneBotClient};
use campfire::bridge::{Bridge, BridgeDeps, DiscardHistory, HistorySink};
use campfire::common::{Clock, SystemClock};
use campfire::config::{env::get_config_path, load_and_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Campfire v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        error!("See campfire.conf.example for reference.");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Management API: {}", config.api.base_url);
    info!("  Platform: {}", config.platform.base_url);
    info!(
        "  Sync every {}s, dedupe window {}s",
        config.bridge.sync_interval_seconds, config.bridge.dedupe_window_seconds
    );
    info!(
        "  Modes: private={}, group={}",
        config.bridge.allow_private, config.bridge.allow_group
    );
    if !config.bridge.enabled {
        warn!("Bridge is disabled in configuration; sessions cannot be started");
    }

    // ============================================================
    // Build collaborators
    // ============================================================

    let timeout = Duration::from_secs(config.bridge.request_timeout_seconds);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let dmp = Arc::new(DmpClient::new(&config.api, timeout)?);
    let platform = OneBotClient::new(&config.platform, timeout)?;

    let history: Arc<dyn HistorySink> = match &config.history {
        Some(history) => {
            let sink = JsonlHistorySink::new(&history.path, clock.clone());
            info!("  History: {}", sink.path().display());
            Arc::new(sink)
        }
        None => Arc::new(DiscardHistory),
    };

    let deps = BridgeDeps {
        poller: dmp.clone(),
        gateway: Arc::new(HttpGateway::new(dmp, platform)),
        history,
        clock,
    };

    // ============================================================
    // Run until interrupted
    // ============================================================

    let mut bridge = Bridge::new(&config.bridge, deps);
    bridge.start().await;

    info!("Campfire is running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    info!("Shutting down...");
    bridge.stop().await;
    info!("Goodbye!");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

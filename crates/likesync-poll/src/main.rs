//! Likesync daemon entry point.
//!
//! Watches the marketplace event feed for like/unlike changes and keeps each
//! listing's public like count in sync. All configuration comes from the
//! environment (see [`Config::from_env`]); there are no CLI flags.
//!
//! # Usage
//!
//! ```bash
//! export LIKESYNC_CLIENT_ID=...
//! export LIKESYNC_CLIENT_SECRET=...
//! likesync-poll
//! ```
//!
//! # Graceful Shutdown
//!
//! SIGINT (Ctrl+C) clears the running flag; the loop finishes the current
//! cycle — listing updates plus the cursor write — and exits between cycles,
//! so shutdown never aborts a half-applied batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use likesync_core::metrics::{init_metrics, start_metrics_server};
use likesync_poll::{ClientConfig, Config, CursorStore, IntegrationClient, Poller, PollerConfig};
use metrics::gauge;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("likesync_core=debug".parse().unwrap())
                .add_directive("likesync_poll=debug".parse().unwrap()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("likesync daemon starting...");

    if config.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(config.metrics_port, handle).await?;
        gauge!("poll_running").set(1.0);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received, stopping after the current cycle...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let client = IntegrationClient::new(ClientConfig {
        base_url: config.base_url.clone(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        query_limit: config.rate_profile.query_limit(),
        command_limit: config.rate_profile.command_limit(),
    })?;

    let cursor_store = CursorStore::new(config.state_file.clone());
    let poller_config = PollerConfig {
        poll_wait: config.poll_wait,
        idle_wait: config.idle_wait,
    };

    tracing::info!("press Ctrl+C to stop");

    let mut poller = Poller::new(client, cursor_store, poller_config, Utc::now(), running);
    let result = poller.run().await;

    gauge!("poll_running").set(0.0);
    result.context("poll loop terminated")?;

    tracing::info!("shutdown complete");
    Ok(())
}

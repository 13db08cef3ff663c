//! Prometheus metrics helpers for the likesync daemon.
//!
//! This module provides centralized metrics initialization and the metric
//! descriptions used across the poller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use likesync_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize the Prometheus recorder
//!     let handle = init_metrics();
//!
//!     // Start the HTTP server for the /metrics endpoint
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     // Now use metrics anywhere in the code
//!     use metrics::counter;
//!     counter!("poll_cycles_total").increment(1);
//! }
//! ```
//!
//! # Naming Conventions
//!
//! - Prefix: component name (`poll_`, `api_`, `rate_limit_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly (`reason`, `channel`) to keep cardinality low

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests or optional metrics.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port. This spawns a
/// background task and returns immediately.
///
/// # Arguments
///
/// * `port` - TCP port to listen on (e.g., 9090)
/// * `handle` - Prometheus handle from [`init_metrics`]
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    Ok(())
}

/// Register descriptions for the metrics emitted by the poller.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Poll Loop Metrics
    // =========================================================================

    describe_counter!("poll_cycles_total", "Completed poll cycles");
    describe_histogram!(
        "poll_cycle_duration_seconds",
        "Wall-clock duration of one poll cycle"
    );
    describe_counter!(
        "poll_events_received_total",
        "Events returned by event queries"
    );
    describe_counter!(
        "poll_events_ignored_total",
        "Events excluded from aggregation (label: reason)"
    );
    describe_counter!(
        "poll_listings_updated_total",
        "Listings whose like count was updated"
    );
    describe_gauge!(
        "poll_cursor_sequence_id",
        "Sequence id of the last processed event"
    );
    describe_gauge!(
        "poll_running",
        "Whether the poll loop is running (1=yes, 0=no)"
    );

    // =========================================================================
    // API Client Metrics
    // =========================================================================

    describe_counter!(
        "api_requests_total",
        "Requests issued to the Integration API (label: channel)"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        "Time spent waiting for a rate-limit slot (label: channel)"
    );
}

//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the archivist server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Channel counts by sync state (collected dynamically)
//!
//! Sync engine metrics live in `archivist_core::metrics` and are registered
//! into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::error;

use archivist_core::SyncState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "archivist_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "archivist_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "archivist_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "archivist_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "archivist_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

/// Commands received over WebSocket by type.
pub static WS_COMMANDS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "archivist_ws_commands_received_total",
            "WebSocket commands received",
        ),
        &["type"],
    )
    .unwrap()
});

// =============================================================================
// Channel Metrics (collected dynamically)
// =============================================================================

/// Channels by current sync state.
pub static CHANNELS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("archivist_channels_by_state", "Current channel count by sync state"),
        &["state"],
    )
    .unwrap()
});

/// Paused channels.
pub static CHANNELS_PAUSED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("archivist_channels_paused", "Number of paused channels").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();
    registry
        .register(Box::new(WS_COMMANDS_RECEIVED.clone()))
        .unwrap();

    // Channels
    registry
        .register(Box::new(CHANNELS_BY_STATE.clone()))
        .unwrap();
    registry
        .register(Box::new(CHANNELS_PAUSED.clone()))
        .unwrap();

    // Core metrics (runs, channels processed, retention, notifications)
    for metric in archivist_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Metric label for a sync state.
fn state_label(state: &SyncState) -> &'static str {
    match state {
        SyncState::Never => "never",
        SyncState::Queued => "queued",
        SyncState::InProgress => "in_progress",
        SyncState::Synced(_) => "synced",
        SyncState::Failed => "failed",
        SyncState::Incomplete => "incomplete",
    }
}

/// Refresh the channel gauges from the registry.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let channels = state.registry().list().await;

    for label in ["never", "queued", "in_progress", "synced", "failed", "incomplete"] {
        let count = channels
            .iter()
            .filter(|c| state_label(&c.last_synced) == label)
            .count();
        CHANNELS_BY_STATE
            .with_label_values(&[label])
            .set(count as i64);
    }
    CHANNELS_PAUSED.set(channels.iter().filter(|c| c.paused).count() as i64);
}

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace channel ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    // Applied twice so adjacent numeric segments are both replaced.
    let result = NUMERIC_SEGMENT.replace_all(path, "/{id}$1");
    NUMERIC_SEGMENT.replace_all(&result, "/{id}$1").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/channels/12"), "/api/v1/channels/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_middle() {
        assert_eq!(
            normalize_path("/api/v1/channels/12/pause"),
            "/api/v1/channels/{id}/pause"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/sync/status"), "/api/v1/sync/status");
    }

    #[test]
    fn test_state_label() {
        assert_eq!(state_label(&SyncState::Never), "never");
        assert_eq!(
            state_label(&SyncState::Synced("01-02-24 10:00:00".to_string())),
            "synced"
        );
        assert_eq!(state_label(&SyncState::InProgress), "in_progress");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("archivist_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Vec metrics only appear once a label set has been touched
        archivist_core::metrics::RUNS_TOTAL
            .with_label_values(&["complete"])
            .inc_by(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        CHANNELS_BY_STATE.with_label_values(&["never"]).set(0);

        let output = encode_metrics();

        assert!(output.contains("archivist_ws_connections_active"));
        assert!(output.contains("archivist_channels_by_state"));
        assert!(output.contains("archivist_sync_runs_total"));
        assert!(output.contains("archivist_sync_run_active"));
        assert!(output.contains("archivist_items_fetched_total"));
    }
}

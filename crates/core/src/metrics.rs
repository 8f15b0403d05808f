//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sync runs (outcomes, active runs)
//! - Channel processing (results, fetched/failed items)
//! - Retention (deleted files)
//! - Library notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Run Metrics
// =============================================================================

/// Completed runs by outcome.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("archivist_sync_runs_total", "Total sync runs by outcome"),
        &["outcome"], // "complete", "partial", "total_failure"
    )
    .unwrap()
});

/// Runs refused because another run was active.
pub static RUNS_REFUSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "archivist_sync_runs_refused_total",
        "Sync triggers refused because a run was already active",
    )
    .unwrap()
});

/// Whether a run is active (1) or idle (0).
pub static RUN_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("archivist_sync_run_active", "Whether a sync run is active").unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("archivist_sync_run_duration_seconds", "Duration of sync runs")
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Channel Metrics
// =============================================================================

/// Channels processed by result.
pub static CHANNELS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "archivist_channels_processed_total",
            "Channels processed by result",
        ),
        &["result"], // "synced", "failed"
    )
    .unwrap()
});

/// Items fetched successfully.
pub static ITEMS_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("archivist_items_fetched_total", "Total items fetched").unwrap()
});

/// Items that failed to fetch.
pub static ITEMS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("archivist_items_failed_total", "Total items that failed to fetch").unwrap()
});

/// Files removed by retention cleanup.
pub static FILES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "archivist_retention_files_deleted_total",
        "Files deleted by retention cleanup",
    )
    .unwrap()
});

// =============================================================================
// Notification Metrics
// =============================================================================

/// Library refresh requests by target and result.
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "archivist_library_notifications_total",
            "Library refresh notifications by target and result",
        ),
        &["target", "result"],
    )
    .unwrap()
});

pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUNS_REFUSED.clone()),
        Box::new(RUN_ACTIVE.clone()),
        Box::new(RUN_DURATION.clone()),
        // Channels
        Box::new(CHANNELS_PROCESSED.clone()),
        Box::new(ITEMS_FETCHED.clone()),
        Box::new(ITEMS_FAILED.clone()),
        Box::new(FILES_DELETED.clone()),
        // Notifications
        Box::new(NOTIFICATIONS_TOTAL.clone()),
    ]
}

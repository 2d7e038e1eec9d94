//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Order lifecycle (creation, status transitions)
//! - Live subscriptions
//! - Cleanup (blob deletions, record retirement)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orders
// =============================================================================

/// Orders created total.
pub static ORDERS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("printdrop_orders_created_total", "Total orders created")
        .unwrap()
});

/// Status transitions applied.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "printdrop_order_status_transitions_total",
            "Order status transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Status change requests refused by the state machine.
pub static TRANSITIONS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printdrop_order_transitions_rejected_total",
        "Status change requests refused as invalid or illegal",
    )
    .unwrap()
});

// =============================================================================
// Live subscriptions
// =============================================================================

/// Currently open subscriptions.
pub static FEED_SUBSCRIPTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "printdrop_feed_subscriptions_active",
        "Number of live subscriptions currently open",
    )
    .unwrap()
});

/// Snapshots delivered to subscribers.
pub static FEED_SNAPSHOTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "printdrop_feed_snapshots_total",
            "Snapshots delivered to subscribers",
        ),
        &["query"], // "order", "shop", "owner"
    )
    .unwrap()
});

/// Times a subscriber fell behind the change channel and resynchronized.
pub static FEED_RESYNCS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printdrop_feed_resyncs_total",
        "Subscriptions that lagged and re-read their snapshot",
    )
    .unwrap()
});

// =============================================================================
// Cleanup
// =============================================================================

/// Blob delete attempts by namespace and result.
pub static BLOB_DELETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "printdrop_blob_deletions_total",
            "Blob delete attempts against object storage",
        ),
        &["namespace", "result"], // "deleted", "rejected", "not_found", "error"
    )
    .unwrap()
});

/// Files whose blob could not be confirmed deleted in any namespace.
pub static BLOBS_ORPHANED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "printdrop_blobs_orphaned_total",
        "Files left in storage after every namespace refused the delete",
    )
    .unwrap()
});

/// Cleanup runs by outcome.
pub static CLEANUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("printdrop_cleanups_total", "Order cleanup runs"),
        &["outcome"], // "retired", "already_gone", "failed"
    )
    .unwrap()
});

/// Cleanup duration in seconds.
pub static CLEANUP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "printdrop_cleanup_duration_seconds",
            "Duration of order cleanup including blob deletion",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orders
        Box::new(ORDERS_CREATED.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(TRANSITIONS_REJECTED.clone()),
        // Feed
        Box::new(FEED_SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(FEED_SNAPSHOTS.clone()),
        Box::new(FEED_RESYNCS.clone()),
        // Cleanup
        Box::new(BLOB_DELETIONS.clone()),
        Box::new(BLOBS_ORPHANED.clone()),
        Box::new(CLEANUPS.clone()),
        Box::new(CLEANUP_DURATION.clone()),
    ]
}

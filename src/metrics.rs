//! Prometheus metrics for subscription and push-feed monitoring.
//!
//! This module provides metrics for:
//! - Subscribe/unsubscribe request outcomes and latency
//! - Push message throughput and reconnects
//! - Applied and dropped content deltas

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Subscribe request latency metric name.
pub const METRIC_SUBSCRIBE_LATENCY: &str = "subscribe_latency_ms";
/// Subscribe requests counter metric name.
pub const METRIC_SUBSCRIBE_REQUESTS: &str = "subscribe_requests_total";
/// Subscribe failures counter metric name.
pub const METRIC_SUBSCRIBE_FAILURES: &str = "subscribe_failures_total";
/// Unsubscribe failures counter metric name.
pub const METRIC_UNSUBSCRIBE_FAILURES: &str = "unsubscribe_failures_total";
/// Next pages requested counter metric name.
pub const METRIC_PAGES_REQUESTED: &str = "pages_requested_total";
/// Content deltas applied counter metric name.
pub const METRIC_UPDATES_APPLIED: &str = "content_updates_applied_total";
/// Deltas referencing unknown ids counter metric name.
pub const METRIC_UPDATES_DROPPED: &str = "content_updates_dropped_total";
/// Push messages received counter metric name.
pub const METRIC_PUSH_MESSAGES_RECEIVED: &str = "push_messages_received_total";
/// Push reconnects counter metric name.
pub const METRIC_PUSH_RECONNECTS: &str = "push_reconnects_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_SUBSCRIBE_LATENCY,
        "Subscribe request round-trip latency in milliseconds"
    );

    describe_counter!(METRIC_SUBSCRIBE_REQUESTS, "Total number of subscribe requests");
    describe_counter!(
        METRIC_SUBSCRIBE_FAILURES,
        "Total number of subscribe requests that failed"
    );
    describe_counter!(
        METRIC_UNSUBSCRIBE_FAILURES,
        "Total number of unsubscribe requests that failed"
    );
    describe_counter!(METRIC_PAGES_REQUESTED, "Total number of next pages requested");
    describe_counter!(
        METRIC_UPDATES_APPLIED,
        "Total number of push deltas applied to storage"
    );
    describe_counter!(
        METRIC_UPDATES_DROPPED,
        "Total number of push deltas dropped for unknown ids"
    );
    describe_counter!(
        METRIC_PUSH_MESSAGES_RECEIVED,
        "Total number of push messages received"
    );
    describe_counter!(METRIC_PUSH_RECONNECTS, "Total number of push reconnections");

    debug!("Metrics initialized");
}

/// Increment subscribe requests counter.
pub fn inc_subscribe_requests() {
    counter!(METRIC_SUBSCRIBE_REQUESTS).increment(1);
}

/// Increment subscribe failures counter.
pub fn inc_subscribe_failures() {
    counter!(METRIC_SUBSCRIBE_FAILURES).increment(1);
}

/// Increment unsubscribe failures counter.
pub fn inc_unsubscribe_failures() {
    counter!(METRIC_UNSUBSCRIBE_FAILURES).increment(1);
}

/// Increment next pages requested counter.
pub fn inc_pages_requested() {
    counter!(METRIC_PAGES_REQUESTED).increment(1);
}

/// Increment applied updates counter, labelled by delta kind.
pub fn inc_updates_applied(kind: &'static str) {
    counter!(METRIC_UPDATES_APPLIED, "kind" => kind).increment(1);
}

/// Increment dropped updates counter, labelled by delta kind.
pub fn inc_updates_dropped(kind: &'static str) {
    counter!(METRIC_UPDATES_DROPPED, "kind" => kind).increment(1);
}

/// Increment push messages received counter.
pub fn inc_push_messages_received() {
    counter!(METRIC_PUSH_MESSAGES_RECEIVED).increment(1);
}

/// Increment push reconnects counter.
pub fn inc_push_reconnects() {
    counter!(METRIC_PUSH_RECONNECTS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for subscribe requests.
pub fn timer_subscribe() -> LatencyTimer {
    LatencyTimer::new(METRIC_SUBSCRIBE_LATENCY)
}

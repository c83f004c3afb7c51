// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the mirror.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `bug_mirror_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: download, update, query
//! - `status`: downloaded, updated, up_to_date, skipped, error
//! - `backend`: file, sql, memory

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record the outcome of a mirror operation
pub fn record_operation(operation: &str, status: &str) {
    counter!(
        "bug_mirror_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "bug_mirror_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record records appended to a product by a merge
pub fn record_appended(product: &str, count: usize) {
    counter!(
        "bug_mirror_records_appended_total",
        "product" => product.to_string()
    )
    .increment(count as u64);
}

/// Record the boundary records dropped during a merge
pub fn record_boundary_dropped(count: usize) {
    counter!("bug_mirror_boundary_dropped_total").increment(count as u64);
}

/// Set the number of records currently mirrored for a product
pub fn set_tracked_records(product: &str, count: usize) {
    gauge!(
        "bug_mirror_tracked_records",
        "product" => product.to_string()
    )
    .set(count as f64);
}

/// Set the number of products with local state
pub fn set_tracked_products(count: usize) {
    gauge!("bug_mirror_tracked_products").set(count as f64);
}

/// Record an error with category for alerting
pub fn record_error(operation: &str, error_type: &str) {
    counter!(
        "bug_mirror_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a remote call that failed and left local state untouched
pub fn record_remote_failure(operation: &str) {
    counter!(
        "bug_mirror_remote_failures_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a fetch-on-miss during a query
pub fn record_query_miss(backend: &str) {
    counter!(
        "bug_mirror_query_misses_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Records latency on drop.
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

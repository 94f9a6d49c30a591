// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for pizza-hunt.
//!
//! Uses the `metrics` crate for backend-agnostic collection. Whoever embeds
//! the server picks the exporter; with none installed every call is a no-op.
//!
//! # Metric Naming Convention
//! - `pizza_hunt_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `component`: store, queue, sync, client
//! - `operation`: list, get, create, update, delete, comment, reply, drain, ...
//! - `status`: success, error, not_found, invalid

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Count one HTTP request by route template and response status.
pub fn record_request(method: &str, route: &str, status: u16) {
    counter!(
        "pizza_hunt_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Count a document-store operation
pub fn record_store_operation(operation: &str, status: &str) {
    counter!(
        "pizza_hunt_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "pizza_hunt_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set pending-write queue depth
pub fn set_queue_depth(count: u64) {
    gauge!("pizza_hunt_queue_pending").set(count as f64);
}

pub fn record_enqueue() {
    counter!("pizza_hunt_queue_enqueued_total").increment(1);
}

/// Record one drain attempt and how many entries it carried.
pub fn record_sync_drain(count: usize, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("pizza_hunt_sync_drains_total", "status" => status).increment(1);
    if success {
        counter!("pizza_hunt_sync_items_total").increment(count as u64);
    }
}

/// Record how a client-side creation ended: created, queued, rejected, failed
pub fn record_submit(outcome: &str) {
    counter!(
        "pizza_hunt_submissions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set connectivity state (1 = online, 0 = offline)
pub fn set_online(online: bool) {
    gauge!("pizza_hunt_online").set(if online { 1.0 } else { 0.0 });
    counter!(
        "pizza_hunt_connectivity_transitions_total",
        "to" => if online { "online" } else { "offline" }
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.component, self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed here: these only check the calls don't panic.

    #[test]
    fn test_counters() {
        record_request("GET", "/api/pizzas", 200);
        record_request("POST", "/api/pizzas", 400);
        record_store_operation("create", "success");
        record_store_operation("update", "not_found");
        record_enqueue();
        record_submit("queued");
    }

    #[test]
    fn test_gauges() {
        set_queue_depth(42);
        set_online(true);
        set_online(false);
    }

    #[test]
    fn test_sync_drain_metrics() {
        record_sync_drain(5, true);
        record_sync_drain(0, false);
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("store", "list");
            std::thread::sleep(Duration::from_micros(10));
        }
    }
}

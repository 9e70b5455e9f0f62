//! Process-wide counters for the processing core.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Counters updated by the worker pools, the timeline manager and the federator.
#[derive(Debug, Default)]
pub struct Metrics {
    // === Worker pools ===
    /// Messages accepted by any pool.
    pub messages_enqueued: AtomicU64,
    /// Messages whose processing returned `Ok`.
    pub messages_processed: AtomicU64,
    /// Messages whose processing returned an error or panicked.
    pub messages_failed: AtomicU64,

    // === Timelines ===
    /// Entries inserted into a cached timeline.
    pub timeline_inserts: AtomicU64,
    /// Entries dropped by eviction, pruning or read-time re-filtering.
    pub timeline_evictions: AtomicU64,
    /// Page requests that had to go to storage.
    pub timeline_backfills: AtomicU64,

    // === Federation ===
    /// Activities received in inboxes.
    pub federation_activities_received: AtomicU64,
    /// Activities delivered to remote inboxes.
    pub federation_activities_delivered: AtomicU64,
    /// Deliveries that failed after retries.
    pub federation_delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_enqueued: u64,
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub timeline_inserts: u64,
    pub timeline_evictions: u64,
    pub timeline_backfills: u64,
    pub federation_activities_received: u64,
    pub federation_activities_delivered: u64,
    pub federation_delivery_failures: u64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages_enqueued: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            timeline_inserts: AtomicU64::new(0),
            timeline_evictions: AtomicU64::new(0),
            timeline_backfills: AtomicU64::new(0),
            federation_activities_received: AtomicU64::new(0),
            federation_activities_delivered: AtomicU64::new(0),
            federation_delivery_failures: AtomicU64::new(0),
        }
    }

    /// Record the outcome of one processed message.
    pub fn record_message(&self, success: bool) {
        if success {
            self.messages_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record evicted timeline entries.
    pub fn record_evictions(&self, count: usize) {
        self.timeline_evictions
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a federation activity received.
    pub fn record_activity_received(&self) {
        self.federation_activities_received
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a federation activity delivered.
    pub fn record_activity_delivered(&self, success: bool) {
        if success {
            self.federation_activities_delivered
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.federation_delivery_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            timeline_inserts: self.timeline_inserts.load(Ordering::Relaxed),
            timeline_evictions: self.timeline_evictions.load(Ordering::Relaxed),
            timeline_backfills: self.timeline_backfills.load(Ordering::Relaxed),
            federation_activities_received: self
                .federation_activities_received
                .load(Ordering::Relaxed),
            federation_activities_delivered: self
                .federation_activities_delivered
                .load(Ordering::Relaxed),
            federation_delivery_failures: self
                .federation_delivery_failures
                .load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_message() {
        let metrics = Metrics::new();
        metrics.record_message(true);
        metrics.record_message(true);
        metrics.record_message(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_processed, 2);
        assert_eq!(snapshot.messages_failed, 1);
    }

    #[test]
    fn test_delivery_counters() {
        let metrics = Metrics::new();
        metrics.record_activity_delivered(true);
        metrics.record_activity_delivered(false);
        metrics.record_evictions(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.federation_activities_delivered, 1);
        assert_eq!(snapshot.federation_delivery_failures, 1);
        assert_eq!(snapshot.timeline_evictions, 3);
    }
}

//! Pipeline metrics for observability
//!
//! Provides counters for monitoring pipeline health: queue-full events,
//! discards, synchronous fallbacks, sink failures and shutdown losses.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one logging pipeline
///
/// All counters use relaxed atomics. Values are exact once the pipeline is
/// quiescent and approximate while producers are running.
///
/// # Example
///
/// ```
/// use rust_async_logger::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
///
/// metrics.record_published();
/// metrics.record_delivered();
/// metrics.record_discarded();
///
/// assert_eq!(metrics.published_count(), 1);
/// assert_eq!(metrics.discarded_count(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Events that went through the ring buffer
    published: AtomicU64,

    /// Events at least one sink accepted, on any route
    delivered: AtomicU64,

    /// Number of times a publish found the ring buffer full
    queue_full_events: AtomicU64,

    /// Number of times a producer blocked waiting for a free slot
    block_events: AtomicU64,

    /// Events delivered on the calling thread instead of the consumer
    synchronous_events: AtomicU64,

    /// Events dropped by the overflow policy
    discarded: AtomicU64,

    /// Sink invocations that returned an error or panicked
    sink_failures: AtomicU64,

    /// Events left in the buffer when shutdown timed out
    abandoned: AtomicU64,

    /// Log calls that arrived after shutdown
    ignored_after_shutdown: AtomicU64,
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            synchronous_events: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            ignored_after_shutdown: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn synchronous_count(&self) -> u64 {
        self.synchronous_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failure_count(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn abandoned_count(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ignored_after_shutdown_count(&self) -> u64 {
        self.ignored_after_shutdown.load(Ordering::Relaxed)
    }

    /// Record an event published to the ring buffer; returns the previous count
    #[inline]
    pub fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_synchronous(&self) -> u64 {
        self.synchronous_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a discarded event; returns the previous count
    #[inline]
    pub fn record_discarded(&self) -> u64 {
        self.discarded.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `count` events abandoned at shutdown
    #[inline]
    pub fn record_abandoned(&self, count: u64) -> u64 {
        self.abandoned.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_ignored_after_shutdown(&self) -> u64 {
        self.ignored_after_shutdown.fetch_add(1, Ordering::Relaxed)
    }

    /// Events lost to discards or shutdown as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been delivered or lost.
    pub fn drop_rate(&self) -> f64 {
        let dropped = (self.discarded_count() + self.abandoned_count()) as f64;
        let total = self.delivered_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.synchronous_events.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
        self.abandoned.store(0, Ordering::Relaxed);
        self.ignored_after_shutdown.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            published: AtomicU64::new(self.published_count()),
            delivered: AtomicU64::new(self.delivered_count()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
            synchronous_events: AtomicU64::new(self.synchronous_count()),
            discarded: AtomicU64::new(self.discarded_count()),
            sink_failures: AtomicU64::new(self.sink_failure_count()),
            abandoned: AtomicU64::new(self.abandoned_count()),
            ignored_after_shutdown: AtomicU64::new(self.ignored_after_shutdown_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.published_count(), 0);
        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.queue_full_events(), 0);
        assert_eq!(metrics.discarded_count(), 0);
        assert_eq!(metrics.abandoned_count(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.record_discarded(), 0);
        assert_eq!(metrics.record_discarded(), 1);
        assert_eq!(metrics.discarded_count(), 2);
        assert_eq!(metrics.record_abandoned(5), 0);
        assert_eq!(metrics.abandoned_count(), 5);
    }

    #[test]
    fn test_drop_rate() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_delivered();
        }
        for _ in 0..10 {
            metrics.record_discarded();
        }

        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_reset() {
        let metrics = PipelineMetrics::new();
        metrics.record_published();
        metrics.record_sink_failure();
        metrics.record_ignored_after_shutdown();

        metrics.reset();

        assert_eq!(metrics.published_count(), 0);
        assert_eq!(metrics.sink_failure_count(), 0);
        assert_eq!(metrics.ignored_after_shutdown_count(), 0);
    }

    #[test]
    fn test_clone_is_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.record_synchronous();

        let snapshot = metrics.clone();
        metrics.record_synchronous();

        assert_eq!(snapshot.synchronous_count(), 1);
        assert_eq!(metrics.synchronous_count(), 2);
    }
}

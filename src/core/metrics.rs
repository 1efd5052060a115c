//! Logger metrics for observability
//!
//! Counters for monitoring logger health: dropped entries, queue overflow,
//! sink failures and throughput.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// Tracks various statistics about logger operation, particularly
/// useful for detecting queue overflow and performance issues.
///
/// # Example
///
/// ```
/// use rust_kafka_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// // Record events
/// metrics.record_dropped();
/// metrics.record_logged();
///
/// // Check counts
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.total_logged(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Number of entries dropped on queue overflow or lost by every sink
    dropped_count: AtomicU64,

    /// Total number of logs successfully sent to queue or written
    total_logged: AtomicU64,

    /// Number of times the queue became full
    queue_full_events: AtomicU64,

    /// Number of times blocking occurred while waiting for queue space
    block_events: AtomicU64,

    /// Number of individual sink failures (one entry can fail several sinks)
    sink_failures: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            total_logged: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Get the number of dropped logs
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Get the total number of logs processed
    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    /// Get the number of queue full events
    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    /// Get the number of blocking events
    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Get the number of sink failures
    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Record a dropped log
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a successfully logged entry
    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a queue full event
    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a blocking event
    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Record one sink failing to accept an entry
    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no logs have been processed.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_logged() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    ///
    /// Useful for testing or periodic reset of metrics.
    pub fn reset(&self) {
        self.dropped_count.store(0, Ordering::Relaxed);
        self.total_logged.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dropped_count: AtomicU64::new(self.dropped_count()),
            total_logged: AtomicU64::new(self.total_logged()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
            sink_failures: AtomicU64::new(self.sink_failures()),
        }
    }
}

/// Broker delivery counters, fed by the delivery report drain
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryStats {
    pub const fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }
}

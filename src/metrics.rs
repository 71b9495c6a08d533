//! Prometheus collectors for one stream session
//!
//! Collectors are owned by the session and registered into a caller-supplied
//! registry, so independent sessions never share counters.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

use crate::error::Result;

/// Processing-time buckets in seconds (10us .. 100ms)
const PROCESSING_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.002_5, 0.005, 0.01, 0.025, 0.05, 0.1,
];

#[derive(Debug, Clone)]
pub struct FeedMetrics {
    pub messages_received: IntCounter,
    pub messages_dropped: IntCounter,
    pub snapshots_delivered: IntCounter,
    pub reconnect_attempts: IntCounter,
    pub connected: IntGauge,
    pub processing_seconds: Histogram,
}

impl FeedMetrics {
    /// Create collectors and register them into `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let metrics = Self::unregistered()?;

        registry.register(Box::new(metrics.messages_received.clone()))?;
        registry.register(Box::new(metrics.messages_dropped.clone()))?;
        registry.register(Box::new(metrics.snapshots_delivered.clone()))?;
        registry.register(Box::new(metrics.reconnect_attempts.clone()))?;
        registry.register(Box::new(metrics.connected.clone()))?;
        registry.register(Box::new(metrics.processing_seconds.clone()))?;

        Ok(metrics)
    }

    /// Create collectors that are not exported anywhere
    pub fn unregistered() -> Result<Self> {
        Ok(Self {
            messages_received: IntCounter::new(
                "l2feed_messages_received_total",
                "Data frames received from the feed",
            )?,
            messages_dropped: IntCounter::new(
                "l2feed_messages_dropped_total",
                "Feed messages dropped as malformed",
            )?,
            snapshots_delivered: IntCounter::new(
                "l2feed_snapshots_delivered_total",
                "Book snapshots handed to the consumer",
            )?,
            reconnect_attempts: IntCounter::new(
                "l2feed_reconnect_attempts_total",
                "Reconnect attempts scheduled after a failure",
            )?,
            connected: IntGauge::new("l2feed_connected", "1 while the feed is streaming")?,
            processing_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "l2feed_processing_seconds",
                    "Time to parse and deliver one feed message",
                )
                .buckets(PROCESSING_BUCKETS.to_vec()),
            )?,
        })
    }
}

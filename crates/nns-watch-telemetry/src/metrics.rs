//! Prometheus metrics for NNS Watch.
//!
//! All metrics follow the naming convention: `nns_watch_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH METRICS
    // =========================================================================

    /// Proposals that advanced the watermark and were fanned out
    pub static ref PROPOSALS_DISPATCHED: Counter = Counter::new(
        "nns_watch_proposals_dispatched_total",
        "Total number of proposals dispatched to subscribers"
    ).expect("metric creation failed");

    /// Notification attempts by outcome
    pub static ref NOTIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("nns_watch_notifications_total", "Notification attempts by outcome"),
        &["outcome"]  // outcome: delivered/unreachable/failed
    ).expect("metric creation failed");

    /// Subscribers removed after the channel reported them unreachable
    pub static ref SUBSCRIBERS_REMOVED: Counter = Counter::new(
        "nns_watch_subscribers_removed_total",
        "Subscribers removed because they became unreachable"
    ).expect("metric creation failed");

    /// Poll cycles skipped because of a fetch or parse failure
    pub static ref FEED_FAILURES: Counter = Counter::new(
        "nns_watch_feed_failures_total",
        "Poll cycles skipped because the proposal feed failed"
    ).expect("metric creation failed");

    // =========================================================================
    // STATE METRICS
    // =========================================================================

    /// Snapshot writes by outcome
    pub static ref SNAPSHOT_WRITES: CounterVec = CounterVec::new(
        Opts::new("nns_watch_snapshot_writes_total", "Snapshot writes by outcome"),
        &["outcome"]  // outcome: ok/error
    ).expect("metric creation failed");

    /// Current subscriber count
    pub static ref SUBSCRIBERS: Gauge = Gauge::new(
        "nns_watch_subscribers",
        "Number of currently subscribed chats"
    ).expect("metric creation failed");

    /// Current proposal watermark
    pub static ref WATERMARK: Gauge = Gauge::new(
        "nns_watch_watermark",
        "Highest proposal id dispatched so far"
    ).expect("metric creation failed");

    // =========================================================================
    // COMMAND METRICS
    // =========================================================================

    /// Commands handled by name
    pub static ref COMMANDS_HANDLED: CounterVec = CounterVec::new(
        Opts::new("nns_watch_commands_total", "Subscriber commands handled"),
        &["command"]
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PROPOSALS_DISPATCHED.clone()),
        Box::new(NOTIFICATIONS.clone()),
        Box::new(SUBSCRIBERS_REMOVED.clone()),
        Box::new(FEED_FAILURES.clone()),
        Box::new(SNAPSHOT_WRITES.clone()),
        Box::new(SUBSCRIBERS.clone()),
        Box::new(WATERMARK.clone()),
        Box::new(COMMANDS_HANDLED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

//! Prometheus metrics for the location-update pipeline and observer fan-out.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only fails on
//! duplicate metric names, which is a programming error that should crash at
//! first use rather than silently drop a series.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, register_int_gauge,
    CounterVec, Encoder, Histogram, IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Location updates applied to the registry.
/// Labels: on_track (true/false)
pub static UPDATES_APPLIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "patrol_updates_applied_total",
        "Location updates applied to the patrol registry",
        &["on_track"]
    )
    .unwrap()
});

/// Location updates rejected before mutation.
/// Labels: reason (denied/not_found/malformed)
pub static UPDATES_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "patrol_updates_rejected_total",
        "Location updates rejected before any state was touched",
        &["reason"]
    )
    .unwrap()
});

/// Patrols created.
pub static PATROLS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("patrol_patrols_created_total", "Patrols created").unwrap()
});

/// Observers currently registered with the hub.
pub static OBSERVERS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "patrol_observers_connected",
        "Observer connections currently in the active set"
    )
    .unwrap()
});

/// Events queued to an observer.
pub static DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "patrol_deliveries_total",
        "Events successfully handed to an observer"
    )
    .unwrap()
});

/// Failed deliveries, each of which dropped an observer.
/// Labels: reason (closed/timed_out)
pub static DELIVERY_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "patrol_delivery_failures_total",
        "Deliveries that failed and removed the observer",
        &["reason"]
    )
    .unwrap()
});

/// Wall time of one broadcast pass in milliseconds.
pub static BROADCAST_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "patrol_broadcast_duration_ms",
        "Time to fan one event out to every observer, in milliseconds",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record an applied location update.
    pub fn update_applied(on_track: bool) {
        let label = if on_track { "true" } else { "false" };
        UPDATES_APPLIED_TOTAL.with_label_values(&[label]).inc();
    }

    /// Record a rejected location update.
    pub fn update_rejected(reason: &str) {
        UPDATES_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a patrol creation.
    pub fn patrol_created() {
        PATROLS_CREATED_TOTAL.inc();
    }

    /// Set the number of registered observers.
    pub fn observers_set(count: usize) {
        OBSERVERS_CONNECTED.set(count as i64);
    }

    /// Record successful deliveries from one broadcast.
    pub fn deliveries(count: usize) {
        DELIVERIES_TOTAL.inc_by(count as u64);
    }

    /// Record a failed delivery.
    pub fn delivery_failed(reason: &str) {
        DELIVERY_FAILURES_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record broadcast latency.
    pub fn broadcast_duration(duration_ms: f64) {
        BROADCAST_DURATION_MS.observe(duration_ms);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

//! Admission filter metrics using the native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters. Use
//! traces for message-level granularity during investigations.

use crate::verdict::ValidationReason;
use prometheus::{
    register_counter, register_gauge, register_gauge_vec, register_histogram,
    register_int_counter_vec, Counter, Gauge, GaugeVec, Histogram, IntCounterVec,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Filter-level metrics.
pub struct Metrics {
    /// Validation outcomes by reason label.
    pub validation_results: IntCounterVec,

    /// Messages currently inside the pipeline, per topic.
    pub active_validations: GaugeVec,

    /// Live (identifier, signer) entries in the schedule.
    pub schedule_entries: Gauge,

    /// Entries dropped by the LRU sweep.
    pub schedule_evictions: Counter,

    /// Latency of the signature verification stage.
    pub signature_verify_seconds: Histogram,
}

impl Metrics {
    fn new() -> Self {
        Self {
            validation_results: register_int_counter_vec!(
                "dvgate_validation_results_total",
                "Admission verdicts by reason",
                &["reason"]
            )
            .unwrap(),

            active_validations: register_gauge_vec!(
                "dvgate_active_validations",
                "Messages currently being validated, per topic",
                &["topic"]
            )
            .unwrap(),

            schedule_entries: register_gauge!(
                "dvgate_schedule_entries",
                "Live (identifier, signer) entries in the message schedule"
            )
            .unwrap(),

            schedule_evictions: register_counter!(
                "dvgate_schedule_evictions_total",
                "Schedule entries dropped by the LRU sweep"
            )
            .unwrap(),

            signature_verify_seconds: register_histogram!(
                "dvgate_signature_verify_seconds",
                "Signature verification latency",
                vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]
            )
            .unwrap(),
        }
    }
}

/// Get the global metrics, initializing on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Count one verdict under its reason label.
pub fn record_validation_result(reason: ValidationReason) {
    metrics()
        .validation_results
        .with_label_values(&[reason.as_label()])
        .inc();
}

pub fn set_schedule_entries(entries: usize) {
    metrics().schedule_entries.set(entries as f64);
}

pub fn record_schedule_evictions(count: usize) {
    metrics().schedule_evictions.inc_by(count as f64);
}

/// RAII guard for the per-topic active-validation gauge: increments on
/// creation, decrements on drop.
pub struct ActiveValidationGuard {
    topic: String,
}

pub fn active_validation(topic: &str) -> ActiveValidationGuard {
    metrics()
        .active_validations
        .with_label_values(&[topic])
        .inc();
    ActiveValidationGuard {
        topic: topic.to_string(),
    }
}

impl Drop for ActiveValidationGuard {
    fn drop(&mut self) {
        metrics()
            .active_validations
            .with_label_values(&[&self.topic])
            .dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_validation_guard_balances() {
        let gauge = metrics().active_validations.with_label_values(&["t1"]);
        let before = gauge.get();
        {
            let _guard = active_validation("t1");
            assert_eq!(gauge.get(), before + 1.0);
        }
        assert_eq!(gauge.get(), before);
    }
}

//! Prometheus metrics for tree builds and simulation dispatch.
//!
//! Counters are process-wide. Hosts that expose them call `register_metrics`
//! once and serve `encode_metrics` from whatever endpoint they run.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== Build Counters ==========

    /// Total builds run to completion or halt
    pub static ref BUILDS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("dmcts_builds_total", "Total tree builds run")
    ).unwrap();

    /// Iterations whose score was backpropagated
    pub static ref ITERATIONS_COMPLETED: IntCounter = IntCounter::with_opts(
        Opts::new("dmcts_iterations_completed_total", "Iterations whose score reached the root")
    ).unwrap();

    /// Iterations dropped before backpropagation, by reason
    pub static ref ITERATIONS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("dmcts_iterations_dropped_total", "Iterations dropped before backpropagation"),
        &["reason"]
    ).unwrap();

    /// Terminal nodes scored without dispatch
    pub static ref TERMINAL_HITS: IntCounter = IntCounter::with_opts(
        Opts::new("dmcts_terminal_hits_total", "Terminal nodes scored without dispatch")
    ).unwrap();

    // ========== Histograms ==========

    /// Wall-clock time per build (seconds)
    pub static ref BUILD_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("dmcts_build_seconds", "Wall-clock time per build")
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0])
    ).unwrap();

    /// Round trip of one dispatched simulation (seconds)
    pub static ref SIMULATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("dmcts_simulation_seconds", "Round trip of one dispatched simulation")
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0])
    ).unwrap();

    // ========== Gauges ==========

    /// Nodes in the most recently built tree
    pub static ref TREE_NODES: IntGauge = IntGauge::with_opts(
        Opts::new("dmcts_tree_nodes", "Nodes in the most recently built tree")
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the registry.
/// Safe to call multiple times - only registers once.
pub fn register_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(BUILDS_TOTAL.clone()),
            Box::new(ITERATIONS_COMPLETED.clone()),
            Box::new(ITERATIONS_DROPPED.clone()),
            Box::new(TERMINAL_HITS.clone()),
            Box::new(BUILD_SECONDS.clone()),
            Box::new(SIMULATION_SECONDS.clone()),
            Box::new(TREE_NODES.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Count an iteration dropped for `reason`.
pub fn record_dropped(reason: &str, count: u64) {
    if count > 0 {
        ITERATIONS_DROPPED.with_label_values(&[reason]).inc_by(count);
    }
}

pub fn observe_simulation(elapsed: Duration) {
    SIMULATION_SECONDS.observe(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_encode_metrics() {
        register_metrics();
        BUILDS_TOTAL.inc();
        record_dropped("timeout", 1);

        let output = encode_metrics();
        assert!(output.contains("dmcts_builds_total"));
        assert!(output.contains("dmcts_iterations_dropped_total"));
    }

    #[test]
    fn test_record_dropped_skips_zero() {
        let before = ITERATIONS_DROPPED.with_label_values(&["unused_reason"]).get();
        record_dropped("unused_reason", 0);
        assert_eq!(ITERATIONS_DROPPED.with_label_values(&["unused_reason"]).get(), before);
    }
}

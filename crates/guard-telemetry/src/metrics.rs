//! Prometheus metrics for the trade guard.
//!
//! Every evaluation is counted by decision; every block by reason, category
//! and severity. Latency is tracked per evaluation and per validator.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error that should surface
//! at first use rather than be swallowed.

use crate::error::TelemetryResult;
use guard_core::{BlockCategory, BlockReason, BlockSeverity, GuardDecision};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, Histogram, HistogramVec, IntGauge, TextEncoder,
};

/// Evaluations by decision (EXECUTE/BLOCK).
pub static EVALUATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "guard_evaluations_total",
        "Total trade guard evaluations",
        &["decision"]
    )
    .unwrap()
});

/// Blocks by reason code.
pub static BLOCKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "guard_blocks_total",
        "Total blocked trade intents",
        &["reason", "category", "severity"]
    )
    .unwrap()
});

/// End-to-end evaluation time.
pub static EVALUATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "guard_evaluation_ms",
        "Trade guard evaluation time in milliseconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .unwrap()
});

/// Per-validator time.
pub static VALIDATOR_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "guard_validator_ms",
        "Validator execution time in milliseconds",
        &["validator"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 20.0, 50.0]
    )
    .unwrap()
});

/// Faults converted into blocks (panic, missing_input, timeout).
pub static INTERNAL_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "guard_internal_errors_total",
        "Internal faults converted into BLOCK decisions",
        &["kind"]
    )
    .unwrap()
});

/// Request ids currently held by the duplicate cache.
pub static DUPLICATE_CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "guard_duplicate_cache_entries",
        "Request ids inside the duplicate window"
    )
    .unwrap()
});

/// Alert dispatch outcomes (sent/skipped/rate_limited/failed/no_sender).
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "guard_alerts_total",
        "Alert dispatch outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Repository failures by operation.
pub static PERSISTENCE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "guard_persistence_failures_total",
        "Repository write failures",
        &["op"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a finished evaluation.
    pub fn evaluation(decision: GuardDecision, elapsed_ms: f64) {
        EVALUATIONS_TOTAL
            .with_label_values(&[decision.as_str()])
            .inc();
        EVALUATION_MS.observe(elapsed_ms);
    }

    /// Record a block.
    pub fn block(reason: BlockReason, category: BlockCategory, severity: BlockSeverity) {
        BLOCKS_TOTAL
            .with_label_values(&[reason.code(), category.as_str(), severity.as_str()])
            .inc();
    }

    pub fn validator_time(validator: &str, elapsed_ms: f64) {
        VALIDATOR_MS
            .with_label_values(&[validator])
            .observe(elapsed_ms);
    }

    pub fn internal_error(kind: &str) {
        INTERNAL_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn duplicate_cache_entries(entries: usize) {
        DUPLICATE_CACHE_ENTRIES.set(i64::try_from(entries).unwrap_or(i64::MAX));
    }

    pub fn alert(outcome: &str) {
        ALERTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn persistence_failure(op: &str) {
        PERSISTENCE_FAILURES_TOTAL.with_label_values(&[op]).inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_counter_uses_reason_code() {
        let before = BLOCKS_TOTAL
            .with_label_values(&["RV_SYSTEM_HALT_STATE", "RULE_VIOLATION", "EMERGENCY"])
            .get();
        Metrics::block(
            BlockReason::RvSystemHaltState,
            BlockCategory::RuleViolation,
            BlockSeverity::Emergency,
        );
        let after = BLOCKS_TOTAL
            .with_label_values(&["RV_SYSTEM_HALT_STATE", "RULE_VIOLATION", "EMERGENCY"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        Metrics::evaluation(GuardDecision::Execute, 0.4);
        Metrics::duplicate_cache_entries(3);
        let text = Metrics::render().unwrap();
        assert!(text.contains("guard_evaluations_total"));
        assert!(text.contains("guard_duplicate_cache_entries"));
    }
}

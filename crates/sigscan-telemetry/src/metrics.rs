//! Prometheus metrics for the scan pipeline.
//!
//! Covers discovery, gateway health, analyzer output, manipulation
//! verdicts and signal emission.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_gauge, CounterVec, Histogram, HistogramVec, IntCounter, IntGauge,
};

/// Total scan cycles by outcome.
/// Labels: outcome (completed/degraded/failed)
pub static SCAN_CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_scan_cycles_total",
        "Total scan cycles by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Scan phase duration in milliseconds.
/// Labels: phase (discovery/snapshot/analysis/compose/total)
pub static SCAN_PHASE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sigscan_scan_phase_duration_ms",
        "Scan phase duration in milliseconds",
        &["phase"],
        vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 15000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Candidates that survived the discovery gates in the latest cycle.
pub static CANDIDATES_CURRENT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sigscan_candidates_current",
        "Candidates that passed discovery in the latest cycle"
    )
    .unwrap()
});

/// Total instruments rejected by filter gate.
pub static FILTER_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_filter_rejected_total",
        "Total instruments rejected by the discovery filter",
        &["gate"]
    )
    .unwrap()
});

/// Total newly listed instruments observed.
pub static NEW_LISTINGS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sigscan_new_listings_total",
        "Total newly listed instruments observed"
    )
    .unwrap()
});

/// Total gateway fetch errors by kind.
pub static GATEWAY_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_gateway_errors_total",
        "Total gateway fetch errors",
        &["kind"]
    )
    .unwrap()
});

/// Total manipulation findings by flag.
pub static MANIPULATION_FLAGS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_manipulation_flags_total",
        "Total manipulation findings by flag",
        &["flag"]
    )
    .unwrap()
});

/// Manipulation score distribution.
pub static MANIPULATION_SCORE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sigscan_manipulation_score",
        "Manipulation score distribution",
        vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]
    )
    .unwrap()
});

/// Total signals emitted.
/// Labels: exchange, direction, quality
pub static SIGNALS_EMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_signals_emitted_total",
        "Total signals emitted",
        &["exchange", "direction", "quality"]
    )
    .unwrap()
});

/// Total compositions suppressed by gate.
pub static SIGNALS_SUPPRESSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_signals_suppressed_total",
        "Total signal compositions suppressed",
        &["reason"]
    )
    .unwrap()
});

/// Quality score distribution of emitted signals.
pub static SIGNAL_QUALITY_SCORE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sigscan_signal_quality_score",
        "Quality score distribution of emitted signals",
        vec![70.0, 75.0, 80.0, 85.0, 90.0, 95.0]
    )
    .unwrap()
});

/// Total ML predictions by path.
/// Labels: path (model/fallback)
pub static ML_PREDICTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sigscan_ml_predictions_total",
        "Total ML predictions by scoring path",
        &["path"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished scan cycle.
    pub fn cycle_finished(outcome: &str) {
        SCAN_CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a scan phase duration.
    pub fn phase_duration(phase: &str, duration_ms: f64) {
        SCAN_PHASE_DURATION_MS
            .with_label_values(&[phase])
            .observe(duration_ms);
    }

    /// Update the surviving-candidate gauge.
    pub fn candidates(count: i64) {
        CANDIDATES_CURRENT.set(count);
    }

    /// Record a discovery filter rejection.
    pub fn filter_rejected(gate: &str) {
        FILTER_REJECTED_TOTAL.with_label_values(&[gate]).inc();
    }

    /// Record a newly listed instrument.
    pub fn new_listing() {
        NEW_LISTINGS_TOTAL.inc();
    }

    /// Record a gateway fetch error.
    pub fn gateway_error(kind: &str) {
        GATEWAY_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record one manipulation finding.
    pub fn manipulation_flag(flag: &str) {
        MANIPULATION_FLAGS_TOTAL.with_label_values(&[flag]).inc();
    }

    /// Record a manipulation score observation.
    pub fn manipulation_score(score: f64) {
        MANIPULATION_SCORE.observe(score);
    }

    /// Record an emitted signal.
    pub fn signal_emitted(exchange: &str, direction: &str, quality: &str, score: f64) {
        SIGNALS_EMITTED_TOTAL
            .with_label_values(&[exchange, direction, quality])
            .inc();
        SIGNAL_QUALITY_SCORE.observe(score);
    }

    /// Record a suppressed composition.
    pub fn signal_suppressed(reason: &str) {
        SIGNALS_SUPPRESSED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record which scoring path produced a prediction.
    pub fn ml_prediction(path: &str) {
        ML_PREDICTIONS_TOTAL.with_label_values(&[path]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_records_without_panic() {
        Metrics::cycle_finished("completed");
        Metrics::phase_duration("total", 1234.0);
        Metrics::candidates(12);
        Metrics::filter_rejected("volume_too_low");
        Metrics::gateway_error("timeout");
        Metrics::manipulation_flag("pump");
        Metrics::manipulation_score(35.0);
        Metrics::signal_emitted("MEXC", "LONG", "HIGH", 82.0);
        Metrics::signal_suppressed("not_consolidated");
        Metrics::ml_prediction("fallback");

        assert!(SCAN_CYCLES_TOTAL.with_label_values(&["completed"]).get() >= 1.0);
    }
}

/// Prometheus metrics for the prediction pipeline
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

static PREDICTION_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "prediction_requests_total",
        "Total number of prediction requests by outcome",
        &["outcome"]
    )
    .expect("Failed to register prediction requests metric")
});

static UNKNOWN_ITEMS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prediction_unknown_items_total",
        "Basket items not present in the serving vocabulary"
    )
    .expect("Failed to register unknown items metric")
});

static SCORING_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "prediction_scoring_duration_seconds",
        "Time spent waiting for a scoring slot and running the scorer",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register scoring duration metric")
});

static ARTIFACT_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "artifact_loads_total",
        "Model bundle load attempts by result",
        &["result"]
    )
    .expect("Failed to register artifact loads metric")
});

/// Metrics collector for prediction requests
pub struct PredictionMetrics;

impl PredictionMetrics {
    /// `outcome` is `success` or an error code
    pub fn record_request(outcome: &str) {
        PREDICTION_REQUESTS.with_label_values(&[outcome]).inc();
    }

    pub fn record_unknown_items(count: usize) {
        if count > 0 {
            UNKNOWN_ITEMS.inc_by(count as u64);
        }
    }

    pub fn record_scoring_duration(duration_secs: f64) {
        SCORING_DURATION.observe(duration_secs);
    }
}

/// Metrics collector for bundle loads
pub struct ArtifactMetrics;

impl ArtifactMetrics {
    pub fn record_load(result: &str) {
        ARTIFACT_LOADS.with_label_values(&[result]).inc();
    }
}

/// Text exposition of every registered metric
pub fn gather_text() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

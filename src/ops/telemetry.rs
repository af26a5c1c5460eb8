// * Telemetry - JSON Logging and Prometheus Metrics
// * Structured logging plus counters describing how extraction degrades in practice

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "review_harvest=debug,info";

lazy_static! {
    // * Live browser sessions
    pub static ref SESSIONS_ACTIVE: Gauge = register_gauge!(
        "review_harvest_sessions_active",
        "Number of live headless browser sessions"
    ).unwrap();

    // * Extraction requests by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "review_harvest_requests_total",
        "Extraction requests by outcome",
        &["outcome"]
    ).unwrap();

    // * Pages run through extraction
    pub static ref PAGES_PROCESSED_TOTAL: CounterVec = register_counter_vec!(
        "review_harvest_pages_processed_total",
        "Pages processed by selector source",
        &["source"]
    ).unwrap();

    // * Accepted review records
    pub static ref REVIEWS_EXTRACTED_TOTAL: CounterVec = register_counter_vec!(
        "review_harvest_reviews_extracted_total",
        "Review records accepted by selector source",
        &["source"]
    ).unwrap();

    // * Inference outcomes
    pub static ref INFERENCE_TOTAL: CounterVec = register_counter_vec!(
        "review_harvest_inference_total",
        "Selector inference attempts by outcome",
        &["outcome"]
    ).unwrap();
}

/// Initializes the tracing subscriber with JSON formatting
///
/// # Example
/// ```ignore
/// use review_harvest::ops::telemetry;
///
/// telemetry::init_tracing();
/// tracing::info!(url = "https://example.com", "Extracting reviews");
/// ```
pub fn init_tracing() {
    init_tracing_with_level(DEFAULT_FILTER);
}

/// Initializes tracing with custom log level
pub fn init_tracing_with_level(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_target(false))
        .try_init();
}

/// Initializes tracing with pretty formatting (for development)
pub fn init_tracing_pretty() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty())
        .try_init();
}

/// Returns the current metrics in Prometheus text format
pub fn get_metrics_string() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Content type of `get_metrics_string`
pub fn metrics_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

pub fn increment_active_sessions() {
    SESSIONS_ACTIVE.inc();
}

pub fn decrement_active_sessions() {
    SESSIONS_ACTIVE.dec();
}

/// Records the outcome of one extraction request
pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Records one processed page and the records it contributed
pub fn record_page(source: &str, reviews: usize) {
    PAGES_PROCESSED_TOTAL.with_label_values(&[source]).inc();
    REVIEWS_EXTRACTED_TOTAL
        .with_label_values(&[source])
        .inc_by(reviews as f64);
}

/// Records one inference outcome (success, timeout, parse_error, empty, transport, zero_match)
pub fn record_inference(outcome: &str) {
    INFERENCE_TOTAL.with_label_values(&[outcome]).inc();
}

//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the hlsproxy server:
//! - HTTP request metrics (latency, counts)
//! - Stream and process gauges (collected dynamically)
//! - Core process and job metrics, registered from `hlsproxy_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "hlsproxy_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hlsproxy_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "hlsproxy_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Stream Metrics (collected dynamically)
// =============================================================================

/// Jobs registered in the process pool.
pub static ACTIVE_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "hlsproxy_active_streams",
        "Number of transcode jobs currently registered",
    )
    .unwrap()
});

/// Supervising loops that have not finished yet.
pub static ACTIVE_PROCESSES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "hlsproxy_active_processes",
        "Number of engine supervisors still running",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Streams
    registry.register(Box::new(ACTIVE_STREAMS.clone())).unwrap();
    registry
        .register(Box::new(ACTIVE_PROCESSES.clone()))
        .unwrap();

    // Core metrics (processes, jobs)
    for metric in hlsproxy_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let pool = state.orchestrator().pool();
    ACTIVE_STREAMS.set(pool.len() as i64);
    ACTIVE_PROCESSES.set(pool.active() as i64);
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());
static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+\.ts$").unwrap());

/// Normalize a path for metric labels (replace IDs and segment numbers with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    let result = SEGMENT_RE.replace_all(&result, "/{segment}.ts");
    result.to_string()
}

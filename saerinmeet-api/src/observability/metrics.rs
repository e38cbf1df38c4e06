//! HTTP request metrics
//!
//! Registered in the core registry so `/metrics` serves them together with
//! the recording lifecycle counters.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, HistogramVec, IntCounterVec, IntGauge,
};
use saerinmeet_core::metrics::REGISTRY;
use std::sync::LazyLock;

/// Total HTTP requests, labeled by method, route, and status code.
pub static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"],
        REGISTRY.clone()
    )
    .expect("failed to register http_requests_total")
});

/// HTTP request duration in seconds, labeled by method and route.
pub static HTTP_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        REGISTRY.clone()
    )
    .expect("failed to register http_request_duration_seconds")
});

/// Number of in-flight HTTP requests.
pub static HTTP_REQUESTS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        REGISTRY.clone()
    )
    .expect("failed to register http_requests_in_flight")
});

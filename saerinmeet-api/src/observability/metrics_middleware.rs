//! Axum middleware for collecting HTTP request metrics.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::metrics;

/// Middleware that records HTTP request count, duration, and in-flight gauge.
///
/// Labels use the matched route template, so ids do not blow up cardinality.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    metrics::HTTP_REQUESTS_IN_FLIGHT.inc();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    metrics::HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);
    metrics::HTTP_REQUESTS_IN_FLIGHT.dec();

    response
}

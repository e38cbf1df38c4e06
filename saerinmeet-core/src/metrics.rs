//! Prometheus metrics for the recording lifecycle
//!
//! Exposed through the `/metrics` endpoint of the HTTP server.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder,
    IntCounterVec, IntGauge, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Recording starts, labelled accepted, rejected by egress, or abandoned after acceptance
pub static RECORDINGS_STARTED: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "recordings_started_total",
        "Total number of recording start attempts",
        &["result"],
        REGISTRY.clone()
    ).expect("Failed to register RECORDINGS_STARTED")
});

/// Terminal transitions, labelled by final status and the writer that won
pub static RECORDINGS_FINISHED: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "recordings_finished_total",
        "Total number of recordings reaching a terminal state",
        &["status", "source"],
        REGISTRY.clone()
    ).expect("Failed to register RECORDINGS_FINISHED")
});

/// Poll ticks by outcome
pub static POLL_TICKS: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "recording_poll_ticks_total",
        "Total number of object-storage checks made by the poll loop",
        &["outcome"],
        REGISTRY.clone()
    ).expect("Failed to register POLL_TICKS")
});

/// Poll loops currently scheduled
pub static ACTIVE_POLLS: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "recording_active_polls",
        "Number of recordings currently awaiting file materialization",
        REGISTRY.clone()
    ).expect("Failed to register ACTIVE_POLLS")
});

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_recording_metrics() {
        RECORDINGS_STARTED.with_label_values(&["accepted"]).inc();
        POLL_TICKS.with_label_values(&["missing"]).inc();

        let output = gather().unwrap();
        assert!(output.contains("recordings_started_total"));
        assert!(output.contains("recording_poll_ticks_total"));
    }
}

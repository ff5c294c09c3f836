//! Application metrics
//!
//! Counters and histograms for the request pipeline, recorded through the
//! `metrics` facade. The Prometheus exporter is installed by the gateway
//! binary; library code only records.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register metric descriptions (call once at startup)
pub fn register_metrics() {
    describe_counter!(
        "lectern_requests_total",
        "Total requests by mode and outcome"
    );
    describe_histogram!(
        "lectern_request_duration_seconds",
        "End-to-end request duration by mode"
    );
    describe_histogram!(
        "lectern_retrieval_duration_seconds",
        "Two-stage retrieval duration"
    );
    describe_histogram!(
        "lectern_retrieval_results",
        "Parent chunks returned per retrieval"
    );
    describe_counter!(
        "lectern_rewrites_total",
        "Query rewrite attempts by outcome"
    );
    describe_histogram!(
        "lectern_generation_duration_seconds",
        "Generation duration by tier"
    );
}

/// Record one completed retrieval
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    histogram!("lectern_retrieval_duration_seconds").record(duration_secs);
    histogram!("lectern_retrieval_results").record(result_count as f64);
}

/// Record one rewrite attempt; `fallback` means the raw query was used
pub fn record_rewrite(fallback: bool) {
    let outcome = if fallback { "fallback" } else { "rewritten" };
    counter!("lectern_rewrites_total", "outcome" => outcome).increment(1);
}

/// Record one completed generation
pub fn record_generation(tier: &'static str, duration_secs: f64) {
    histogram!("lectern_generation_duration_seconds", "tier" => tier).record(duration_secs);
}

/// Record one finished request
pub fn record_request(mode: &'static str, outcome: &'static str, duration_secs: f64) {
    counter!("lectern_requests_total", "mode" => mode, "outcome" => outcome).increment(1);
    histogram!("lectern_request_duration_seconds", "mode" => mode).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording against the default (no-op) recorder must not panic
    #[test]
    fn test_recording_without_exporter_is_noop() {
        register_metrics();
        record_retrieval(0.05, 3);
        record_rewrite(true);
        record_rewrite(false);
        record_generation("full", 1.2);
        record_request("chat", "completed", 2.5);
    }
}

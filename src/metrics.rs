//! Prometheus metrics for the conversation loop
//!
//! Metrics are registered in the default registry on first use.
//! [`render`] produces the text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Session Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished submissions by how they ended.
    ///
    /// Labels:
    /// - outcome: "completed", "iteration_limit", "cancelled", "transport_error"
    pub static ref SUBMISSIONS: IntCounterVec = register_int_counter_vec!(
        "lynexus_submissions_total",
        "User submissions processed by the conversation loop",
        &["outcome"]
    ).expect("failed to register SUBMISSIONS metric");

    /// Model round-trips used per submission.
    pub static ref SUBMISSION_ITERATIONS: Histogram = register_histogram!(
        "lynexus_submission_iterations",
        "Model round-trips per submission",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0]
    ).expect("failed to register SUBMISSION_ITERATIONS metric");

    /// Model turns that started with the command marker but did not parse.
    pub static ref PROTOCOL_ERRORS: IntCounter = register_int_counter!(
        "lynexus_protocol_errors_total",
        "Malformed commands emitted by the model"
    ).expect("failed to register PROTOCOL_ERRORS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Model Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Model calls by model and status ("ok" / "error").
    pub static ref MODEL_CALLS: IntCounterVec = register_int_counter_vec!(
        "lynexus_model_calls_total",
        "Calls to the model collaborator",
        &["model", "status"]
    ).expect("failed to register MODEL_CALLS metric");

    /// Model call latency in seconds.
    pub static ref MODEL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "lynexus_model_call_duration_seconds",
        "Latency of model calls",
        &["model"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register MODEL_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Dispatched tool calls.
    ///
    /// Labels:
    /// - tool: requested tool name (as written by the model)
    /// - status: "success", "failure", "not_found", "invalid"
    pub static ref TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "lynexus_tool_calls_total",
        "Tool calls dispatched from model commands",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Tool execution latency in seconds (invocations only).
    pub static ref TOOL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "lynexus_tool_call_duration_seconds",
        "Latency of tool invocations",
        &["tool"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).expect("failed to register TOOL_CALL_DURATION metric");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        PROTOCOL_ERRORS.inc();
        TOOL_CALLS.with_label_values(&["metrics_test_tool", "success"]).inc();

        let text = render();
        assert!(text.contains("lynexus_protocol_errors_total"));
        assert!(text.contains("metrics_test_tool"));
    }
}

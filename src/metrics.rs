/// Prometheus metrics
///
/// Counters for HTTP traffic and the domain events worth watching on a
/// dashboard: signups, prompts, remixes, likes, and background jobs.
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    /// Account registrations
    pub static ref ACCOUNTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "accounts_created_total",
        "Total number of accounts created",
        &["outcome"]
    )
    .unwrap();

    /// Prompt lifecycle events
    pub static ref PROMPT_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "prompt_events_total",
        "Prompt lifecycle events",
        &["event"]
    )
    .unwrap();

    /// Engagement events (likes, bookmarks, comments)
    pub static ref ENGAGEMENT_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "engagement_events_total",
        "Engagement events",
        &["event"]
    )
    .unwrap();

    /// Rejected /v1 requests by reason
    pub static ref API_KEY_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "api_key_rejections_total",
        "Public API requests rejected",
        &["reason"]
    )
    .unwrap();

    /// Viewers currently connected to presence sockets
    pub static ref PRESENCE_VIEWERS: IntGauge = register_int_gauge!(
        "presence_viewers",
        "Number of connected presence viewers"
    )
    .unwrap();

    /// Background job executions by job and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Background job executions",
        &["job", "status"]
    )
    .unwrap();
}

/// Render all metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

pub fn record_prompt_event(event: &str) {
    PROMPT_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_engagement_event(event: &str) {
    ENGAGEMENT_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_account_creation(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    ACCOUNTS_CREATED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_api_key_rejection(reason: &str) {
    API_KEY_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_background_job(job: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL.with_label_values(&[job, status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_series() {
        record_http_request("GET", "/api/prompts", 200, 0.003);
        record_prompt_event("created");
        record_background_job("session_cleanup", "ok");

        let output = render_metrics();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("prompt_events_total"));
        assert!(output.contains("background_jobs_total"));
    }
}

//! HTTP metrics.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "lipsync_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "lipsync_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "lipsync_http_requests_in_flight";
}

/// Install the global Prometheus recorder.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Middleware recording request count, latency and in-flight requests.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = sanitize_path(request.uri().path());

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let start = Instant::now();

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    record_http_request(
        &method,
        path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse unknown paths into one label value.
fn sanitize_path(path: &str) -> &'static str {
    match path {
        "/generate" => "/generate",
        "/health" => "/health",
        "/healthz" => "/healthz",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

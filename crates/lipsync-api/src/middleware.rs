//! HTTP middleware.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header::HeaderValue, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const AUTH_HEADER: &str = "auth";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reject requests whose `auth` header does not match the configured secret.
///
/// Runs before any extractor touches the body.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_authorized(request.headers(), &state.config.auth_secret) {
        warn!(path = %request.uri().path(), "Rejected request with invalid auth header");
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

fn is_authorized(headers: &HeaderMap, secret: &str) -> bool {
    let Some(provided) = headers.get(AUTH_HEADER) else {
        return false;
    };
    let provided = provided.as_bytes();
    let expected = secret.as_bytes();
    provided.len() == expected.len() && bool::from(provided.ct_eq(expected))
}

/// Request ID middleware - adds or propagates X-Request-ID header.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if matches!(path.as_str(), "/health" | "/healthz" | "/ready" | "/metrics") {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

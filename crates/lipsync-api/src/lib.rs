//! Axum HTTP front-end.
//!
//! This crate provides:
//! - `POST /generate`, guarded by a shared-secret `auth` header
//! - Liveness and readiness checks
//! - Prometheus metrics and request logging

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

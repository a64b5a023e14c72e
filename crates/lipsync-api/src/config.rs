//! API configuration.

use std::fmt;

use crate::error::{ApiError, ApiResult};

/// API server configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expected value of the `auth` header
    pub auth_secret: String,
    pub metrics_enabled: bool,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_body_size", &self.max_body_size)
            .field("environment", &self.environment)
            .field("auth_secret", &"<redacted>")
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl ApiConfig {
    /// Config with defaults and the given secret.
    pub fn with_secret(auth_secret: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            max_body_size: 64 * 1024,
            environment: "development".to_string(),
            auth_secret: auth_secret.into(),
            metrics_enabled: true,
        }
    }

    /// Create config from environment variables. `AUTH_HEADER` is required.
    pub fn from_env() -> ApiResult<Self> {
        let auth_secret = std::env::var("AUTH_HEADER")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::config("AUTH_HEADER must be set"))?;

        let defaults = Self::with_secret(auth_secret);

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            auth_secret: defaults.auth_secret,
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let config = ApiConfig::with_secret("hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::with_secret("s");
        assert_eq!(config.port, 8081);
        assert_eq!(config.max_body_size, 64 * 1024);
        assert!(!config.is_production());
    }
}

//! HTTP inference engine client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::engine::InferenceEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::types::{ComputeInvocationSpec, HealthResponse, InferenceResponse};

/// Configuration for the HTTP engine.
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Upper bound for a single request; the invoker applies its own deadline
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            request_timeout: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpEngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("INFERENCE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: std::env::var("INFERENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            connect_timeout: defaults.connect_timeout,
        }
    }
}

/// Engine reached over HTTP: `POST {base_url}/inference` with the invocation as JSON.
pub struct HttpInferenceEngine {
    http: Client,
    config: HttpEngineConfig,
}

impl HttpInferenceEngine {
    pub fn new(config: HttpEngineConfig) -> InferenceResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(InferenceError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> InferenceResult<Self> {
        Self::new(HttpEngineConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl InferenceEngine for HttpInferenceEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, spec: &ComputeInvocationSpec) -> InferenceResult<()> {
        let url = format!("{}/inference", self.config.base_url);

        debug!("Sending inference request to {}", url);

        let response = self
            .http
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.config.request_timeout.as_secs())
                } else if e.is_connect() {
                    InferenceError::Unavailable(e.to_string())
                } else {
                    InferenceError::Network(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(InferenceError::Unavailable(body));
        }

        if !status.is_success() {
            return Err(InferenceError::engine(format!(
                "engine returned {}: {}",
                status,
                error_message(&body)
            )));
        }

        let parsed: InferenceResponse = serde_json::from_str(&body)?;
        match parsed.error {
            Some(message) => Err(InferenceError::engine(message)),
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> InferenceResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Inference engine health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference engine health check error: {}", e);
                Ok(false)
            }
        }
    }
}

/// Pull `detail` or `error` out of a JSON error body, else return it raw.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelConstants;
    use lipsync_models::JobParameters;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> ComputeInvocationSpec {
        ComputeInvocationSpec::new(
            &ModelConstants::default(),
            &JobParameters::default(),
            "/ws/video.mp4",
            "/ws/audio.wav",
            "/ws/output_1247.mp4",
        )
    }

    fn engine(server: &MockServer) -> HttpInferenceEngine {
        HttpInferenceEngine::new(HttpEngineConfig {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = HttpEngineConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8001");
        assert_eq!(config.request_timeout, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_run_posts_invocation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .and(body_partial_json(serde_json::json!({
                "video_out_path": "/ws/output_1247.mp4",
                "seed": 1247
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        engine(&server).run(&spec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_engine_failure_keeps_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "CUDA out of memory"})),
            )
            .mount(&server)
            .await;

        let err = engine(&server).run(&spec()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Engine { ref message } if message.contains("CUDA out of memory")));
    }

    #[tokio::test]
    async fn test_run_error_in_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "failed", "error": "no face detected"}),
            ))
            .mount(&server)
            .await;

        let err = engine(&server).run(&spec()).await.unwrap_err();
        assert_eq!(err.to_string(), "Inference engine failed: no face detected");
    }

    #[tokio::test]
    async fn test_run_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let err = engine(&server).run(&spec()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "healthy"})))
            .mount(&server)
            .await;

        assert!(engine(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let engine = HttpInferenceEngine::new(HttpEngineConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert!(!engine.health_check().await.unwrap());
    }
}

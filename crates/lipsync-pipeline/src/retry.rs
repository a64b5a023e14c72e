//! Retry with exponential backoff for fetch and publish.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::PipelineResult;
use crate::metrics::record_retry;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    ///
    /// `max_retries_var` names the per-operation retry count; the backoff
    /// delays are shared (`RETRY_BASE_DELAY_MS`, `RETRY_MAX_DELAY_MS`).
    pub fn from_env(max_retries_var: &str) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var(max_retries_var)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay: std::env::var("RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: std::env::var("RETRY_MAX_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Run `operation`, retrying retryable failures up to `config.max_retries`
/// times. Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation_name: &str, operation: F) -> PipelineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    operation_name, attempt, delay, e
                );
                record_retry(operation_name);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

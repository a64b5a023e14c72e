//! Job queue using Redis Streams.

use std::time::Duration;

use lipsync_models::{JobId, QueueJob, QueueJobInput};
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream jobs are read from
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Stream results are appended to
    pub result_stream_name: String,
    /// Prefix of the per-job result keys
    pub result_key_prefix: String,
    /// How long per-job result keys live
    pub result_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "lipsync:jobs".to_string(),
            consumer_group: "lipsync:workers".to_string(),
            result_stream_name: "lipsync:results".to_string(),
            result_key_prefix: "lipsync:result".to_string(),
            result_ttl: Duration::from_secs(86400),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            result_stream_name: std::env::var("QUEUE_RESULT_STREAM")
                .unwrap_or(defaults.result_stream_name),
            result_key_prefix: defaults.result_key_prefix,
            result_ttl: std::env::var("QUEUE_RESULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.result_ttl),
        }
    }

    /// Key holding the result of one job.
    pub fn result_key(&self, id: &str) -> String {
        format!("{}:{}", self.result_key_prefix, id)
    }
}

/// One delivered message.
///
/// The payload is kept as raw JSON so the handler decides how to report a
/// malformed job; a payload that is not JSON at all arrives as a string.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub payload: Value,
}

impl QueueMessage {
    /// Id under which this message's result is stored.
    pub fn result_id(&self) -> String {
        result_id(&self.payload, &self.message_id)
    }
}

/// The job's `id` when it carries a valid one, else the stream message id.
pub fn result_id(payload: &Value, message_id: &str) -> String {
    payload
        .get("id")
        .and_then(Value::as_str)
        .and_then(|id| JobId::parse(id).ok())
        .map(|id| id.to_string())
        .unwrap_or_else(|| message_id.to_string())
}

fn parse_payload(raw: &[u8]) -> Value {
    let text = String::from_utf8_lossy(raw);
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!("Job payload is not valid JSON: {}", e);
        Value::String(text.into_owned())
    })
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job, assigning it an id. Returns the id results are stored under.
    pub async fn enqueue(&self, input: QueueJobInput) -> QueueResult<JobId> {
        let job_id = JobId::new();
        let job = QueueJob {
            id: Some(job_id.clone()),
            input,
        };

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(&job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        info!("Enqueued job {} with message ID {}", job_id, message_id);
        Ok(job_id)
    }

    /// Read up to `count` new messages for `consumer_name`, blocking up to `block_ms`.
    ///
    /// Only never-delivered messages (`>`) are read. Messages a consumer read
    /// but never acked, e.g. because it stopped mid-job, stay in the pending
    /// list and are not reclaimed here.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<QueueMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let payload = match entry.map.get("job") {
                    Some(redis::Value::BulkString(raw)) => parse_payload(raw),
                    _ => {
                        warn!("Message {} has no job field", entry.id);
                        Value::Null
                    }
                };
                debug!("Consumed message {} from stream", entry.id);
                messages.push(QueueMessage {
                    message_id: entry.id,
                    payload,
                });
            }
        }

        Ok(messages)
    }

    /// Store the handler output for a message and acknowledge it.
    ///
    /// The output is written to the per-job result key (with TTL) and
    /// appended to the result stream before the message is acked.
    pub async fn respond(&self, message: &QueueMessage, output: &Value) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let id = message.result_id();
        let body = serde_json::to_string(output)?;

        conn.set_ex::<_, _, ()>(
            self.config.result_key(&id),
            &body,
            self.config.result_ttl.as_secs(),
        )
        .await
        .map_err(|e| QueueError::respond_failed(&message.message_id, e))?;

        redis::cmd("XADD")
            .arg(&self.config.result_stream_name)
            .arg("*")
            .arg("id")
            .arg(&id)
            .arg("result")
            .arg(&body)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::respond_failed(&message.message_id, e))?;

        self.ack(&message.message_id).await
    }

    /// Acknowledge a message and remove it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "lipsync:jobs");
        assert_eq!(config.consumer_group, "lipsync:workers");
        assert_eq!(config.result_key("job-1"), "lipsync:result:job-1");
    }

    #[test]
    fn test_result_id_prefers_job_id() {
        let payload = json!({"id": "job-7", "input": {}});
        assert_eq!(result_id(&payload, "1-0"), "job-7");
    }

    #[test]
    fn test_result_id_falls_back_to_message_id() {
        assert_eq!(result_id(&json!({"input": {}}), "1-0"), "1-0");
        assert_eq!(result_id(&json!({"id": "../../x"}), "2-0"), "2-0");
        assert_eq!(result_id(&json!("garbage"), "3-0"), "3-0");
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(br#"{"input":{"seed":1}}"#)["input"]["seed"], 1);
        assert_eq!(parse_payload(b"not json"), Value::String("not json".into()));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = QueueConfig {
            redis_url: "not-a-url".to_string(),
            ..Default::default()
        };
        assert!(JobQueue::new(config).is_err());
    }
}

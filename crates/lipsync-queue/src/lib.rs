//! Redis Streams job queue.
//!
//! Producers `enqueue` a queue job; workers `consume` raw payloads through a
//! consumer group, hand them to the serverless handler, and `respond` with
//! its output, which stores the result and acknowledges the message.

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{result_id, JobQueue, QueueConfig, QueueMessage};

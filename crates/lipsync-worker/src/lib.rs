//! Queue-driven lip-sync worker.
//!
//! `ServerlessHandler` turns one raw job payload into an output payload and
//! never fails; `JobExecutor` feeds it from the Redis stream.

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;

pub use config::{ResultStoreKind, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, ResultSink};
pub use handler::ServerlessHandler;

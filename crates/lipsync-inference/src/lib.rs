//! Client for the lip-sync inference engine.
//!
//! The engine itself is an external GPU service. This crate provides:
//! - `ComputeInvocationSpec`, the immutable per-job parameter bundle
//! - The `InferenceEngine` trait and its HTTP implementation
//! - `InferenceInvoker`, which bounds concurrent engine calls to the size of
//!   the compute pool and enforces the invocation deadline

pub mod client;
pub mod engine;
pub mod error;
pub mod pool;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{HttpEngineConfig, HttpInferenceEngine};
pub use engine::InferenceEngine;
pub use error::{InferenceError, InferenceResult};
pub use pool::{InferenceInvoker, Invocation, InvokerConfig, PendingCall};
pub use types::{ComputeInvocationSpec, ModelConstants};

//! Input staging for lip-sync jobs.
//!
//! This crate provides:
//! - Asset fetching from HTTP(S) URLs and local paths into a workspace
//! - Per-job workspace allocation with guaranteed cleanup

pub mod error;
pub mod fetch;
pub mod workspace;

pub use error::{FetchError, FetchResult, WorkspaceError, WorkspaceResult};
pub use fetch::{AssetFetcher, FetchConfig};
pub use workspace::{AssetKind, Workspace, WorkspaceManager};

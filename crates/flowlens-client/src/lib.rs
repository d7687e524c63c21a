//! Read-only client for workflow run metadata.
//!
//! This crate provides:
//! - The run/step/task/artifact data model and pathspec parsing
//! - The `FlowClient` trait, the seam between tools and the backend store
//! - `ServiceClient`, an HTTP implementation against a metadata service
//! - `InMemoryClient`, a deterministic in-process backend for tests
//! - Log filtering helpers (head/tail/pattern)
//!
//! Configuration is explicit: a `ClientConfig` is resolved once (usually
//! from the environment) and passed into constructors. There is no ambient
//! namespace state to mutate.

pub mod client;
pub mod config;
pub mod error;
pub mod logs;
pub mod memory;
pub mod model;
pub mod service;

pub use client::FlowClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use logs::LogFilter;
pub use memory::{InMemoryClient, RunFixture, StepFixture, TaskFixture};
pub use model::{
    duration_seconds, ArtifactInfo, ArtifactValue, FlowSummary, RunInfo, RunPath, RunStatus,
    StepInfo, TaskInfo, TaskLogs, TaskPath,
};
pub use service::ServiceClient;

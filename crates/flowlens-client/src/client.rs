//! The `FlowClient` trait: the read-only query surface over the backend
//! store. Tools and the benchmark harness depend on this seam, never on a
//! concrete backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    ArtifactInfo, ArtifactValue, FlowSummary, RunInfo, RunPath, StepInfo, TaskInfo, TaskLogs,
    TaskPath,
};

/// Read-only access to flows, runs, steps, tasks, and artifacts.
///
/// Implementations must be thread-safe; the tool facade is reentrant and the
/// benchmark harness issues concurrent queries. All operations are single
/// attempt; retry policy belongs to the caller, and no caller here has one.
#[async_trait]
pub trait FlowClient: Send + Sync {
    /// All flows visible to the configured namespace.
    async fn list_flows(&self) -> Result<Vec<FlowSummary>>;

    /// Runs of a flow, newest first, at most `limit`.
    async fn list_runs(&self, flow: &str, limit: usize) -> Result<Vec<RunInfo>>;

    /// A single run by pathspec.
    async fn get_run(&self, path: &RunPath) -> Result<RunInfo>;

    /// Steps of a run, in execution order.
    async fn list_steps(&self, path: &RunPath) -> Result<Vec<StepInfo>>;

    /// Tasks of a step, in creation order.
    async fn list_tasks(&self, path: &RunPath, step: &str) -> Result<Vec<TaskInfo>>;

    /// Captured stdout/stderr for a task.
    async fn get_task_logs(&self, path: &TaskPath) -> Result<TaskLogs>;

    /// Artifact metadata for a task, in production order, without values.
    async fn list_artifacts(&self, path: &TaskPath) -> Result<Vec<ArtifactInfo>>;

    /// Materialize one artifact value.
    async fn get_artifact(&self, path: &TaskPath, name: &str) -> Result<ArtifactValue>;
}

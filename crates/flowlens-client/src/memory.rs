//! Deterministic in-process `FlowClient` backed by fixture data.
//!
//! Used as the test backend across the workspace. Fixtures are built with
//! the `RunFixture`/`StepFixture`/`TaskFixture` builders; timestamps are
//! derived from a fixed epoch so runs order deterministically.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::client::FlowClient;
use crate::error::{ClientError, Result};
use crate::model::{
    ArtifactInfo, ArtifactValue, FlowSummary, RunInfo, RunPath, RunStatus, StepInfo, TaskInfo,
    TaskLogs, TaskPath,
};

/// Fixed base timestamp for fixture data.
fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A complete run fixture: run info plus its steps and tasks.
#[derive(Debug, Clone)]
pub struct RunFixture {
    pub info: RunInfo,
    pub steps: Vec<StepFixture>,
}

impl RunFixture {
    /// Build a run created `minutes` after the fixture epoch. Finished runs
    /// get a finish timestamp one minute after creation.
    pub fn new(flow: &str, id: &str, status: RunStatus, minutes: i64) -> Self {
        let created_at = base_time() + Duration::minutes(minutes);
        let finished_at = status
            .finished()
            .then(|| created_at + Duration::minutes(1));
        Self {
            info: RunInfo {
                pathspec: format!("{flow}/{id}"),
                id: id.to_string(),
                flow: flow.to_string(),
                status,
                created_at,
                finished_at,
                namespace: None,
                tags: Vec::new(),
            },
            steps: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.info.tags = tags.iter().map(|t| t.to_string()).collect();
        self.info.tags.sort();
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.info.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_step(mut self, step: StepFixture) -> Self {
        self.steps.push(step);
        self
    }
}

/// A step fixture holding its tasks in creation order.
#[derive(Debug, Clone)]
pub struct StepFixture {
    pub info: StepInfo,
    pub tasks: Vec<TaskFixture>,
}

impl StepFixture {
    pub fn new(name: &str, minutes: i64) -> Self {
        let created_at = base_time() + Duration::minutes(minutes);
        Self {
            info: StepInfo {
                name: name.to_string(),
                created_at,
                finished_at: Some(created_at + Duration::seconds(30)),
            },
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: TaskFixture) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A task fixture with logs and artifacts in production order.
#[derive(Debug, Clone)]
pub struct TaskFixture {
    pub info: TaskInfo,
    pub logs: TaskLogs,
    pub artifacts: Vec<(ArtifactInfo, serde_json::Value)>,
}

impl TaskFixture {
    pub fn new(id: &str, status: RunStatus, minutes: i64) -> Self {
        let created_at = base_time() + Duration::minutes(minutes);
        let finished_at = status
            .finished()
            .then(|| created_at + Duration::seconds(20));
        Self {
            info: TaskInfo {
                id: id.to_string(),
                status,
                created_at,
                finished_at,
                exception: None,
            },
            logs: TaskLogs::default(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_logs(mut self, stdout: &str, stderr: &str) -> Self {
        self.logs = TaskLogs {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
        self
    }

    pub fn with_exception(mut self, exception: &str) -> Self {
        self.info.exception = Some(exception.to_string());
        self
    }

    pub fn with_artifact(mut self, name: &str, value: serde_json::Value) -> Self {
        let created_at = self.info.created_at + Duration::seconds(self.artifacts.len() as i64);
        self.artifacts.push((
            ArtifactInfo {
                name: name.to_string(),
                sha: content_sha(&value),
                created_at,
            },
            value,
        ));
        self
    }
}

fn content_sha(value: &serde_json::Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Rough type name for a JSON value, mirroring what a dynamic client
/// library would report for the stored object.
fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "none",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "int",
        serde_json::Value::String(_) => "str",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "dict",
    }
}

#[derive(Debug, Clone)]
struct FlowEntry {
    name: String,
    /// Insertion order; served newest-first by `created_at`.
    runs: Vec<RunFixture>,
}

/// In-memory `FlowClient` implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClient {
    flows: Vec<FlowEntry>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run, creating its flow entry on first use.
    pub fn add_run(&mut self, run: RunFixture) {
        let flow = run.info.flow.clone();
        match self.flows.iter_mut().find(|f| f.name == flow) {
            Some(entry) => entry.runs.push(run),
            None => self.flows.push(FlowEntry {
                name: flow,
                runs: vec![run],
            }),
        }
    }

    fn flow(&self, name: &str) -> Result<&FlowEntry> {
        self.flows
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ClientError::not_found("flow", name))
    }

    fn run(&self, path: &RunPath) -> Result<&RunFixture> {
        self.flow(&path.flow)?
            .runs
            .iter()
            .find(|r| r.info.id == path.run)
            .ok_or_else(|| ClientError::not_found("run", path.to_string()))
    }

    fn task(&self, path: &TaskPath) -> Result<&TaskFixture> {
        let run = self.run(&path.run_path())?;
        let step = run
            .steps
            .iter()
            .find(|s| s.info.name == path.step)
            .ok_or_else(|| {
                ClientError::not_found("step", format!("{}/{}", path.run_path(), path.step))
            })?;
        step.tasks
            .iter()
            .find(|t| t.info.id == path.task)
            .ok_or_else(|| ClientError::not_found("task", path.to_string()))
    }
}

#[async_trait]
impl FlowClient for InMemoryClient {
    async fn list_flows(&self) -> Result<Vec<FlowSummary>> {
        Ok(self
            .flows
            .iter()
            .map(|f| FlowSummary {
                id: f.name.clone(),
                num_runs: f.runs.len(),
            })
            .collect())
    }

    async fn list_runs(&self, flow: &str, limit: usize) -> Result<Vec<RunInfo>> {
        let mut runs: Vec<RunInfo> = self
            .flow(flow)?
            .runs
            .iter()
            .map(|r| r.info.clone())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn get_run(&self, path: &RunPath) -> Result<RunInfo> {
        Ok(self.run(path)?.info.clone())
    }

    async fn list_steps(&self, path: &RunPath) -> Result<Vec<StepInfo>> {
        Ok(self.run(path)?.steps.iter().map(|s| s.info.clone()).collect())
    }

    async fn list_tasks(&self, path: &RunPath, step: &str) -> Result<Vec<TaskInfo>> {
        let run = self.run(path)?;
        let step = run
            .steps
            .iter()
            .find(|s| s.info.name == step)
            .ok_or_else(|| ClientError::not_found("step", format!("{path}/{step}")))?;
        Ok(step.tasks.iter().map(|t| t.info.clone()).collect())
    }

    async fn get_task_logs(&self, path: &TaskPath) -> Result<TaskLogs> {
        Ok(self.task(path)?.logs.clone())
    }

    async fn list_artifacts(&self, path: &TaskPath) -> Result<Vec<ArtifactInfo>> {
        Ok(self
            .task(path)?
            .artifacts
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn get_artifact(&self, path: &TaskPath, name: &str) -> Result<ArtifactValue> {
        let task = self.task(path)?;
        let (info, value) = task
            .artifacts
            .iter()
            .find(|(info, _)| info.name == name)
            .ok_or_else(|| ClientError::not_found("artifact", format!("{path}: {name}")))?;
        Ok(ArtifactValue {
            name: info.name.clone(),
            type_name: value_type_name(value).to_string(),
            value: value.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> InMemoryClient {
        let mut client = InMemoryClient::new();
        client.add_run(RunFixture::new("Train", "1", RunStatus::Completed, 0));
        client.add_run(
            RunFixture::new("Train", "2", RunStatus::Failed, 10).with_step(
                StepFixture::new("fit", 10).with_task(
                    TaskFixture::new("3", RunStatus::Failed, 10)
                        .with_logs("starting\n", "ValueError: bad input\n")
                        .with_exception("ValueError('bad input')")
                        .with_artifact("model", json!({"weights": [1, 2]}))
                        .with_artifact("accuracy", json!(0.91)),
                ),
            ),
        );
        client.add_run(RunFixture::new("Train", "3", RunStatus::Running, 20));
        client
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let client = fixture();
        let runs = client.list_runs("Train", 10).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_list_runs_respects_limit() {
        let client = fixture();
        assert_eq!(client.list_runs("Train", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_flow_is_not_found() {
        let client = fixture();
        let err = client.list_runs("Missing", 5).await.unwrap_err();
        assert_eq!(err.kind_name(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_artifacts_in_production_order() {
        let client = fixture();
        let path: TaskPath = "Train/2/fit/3".parse().unwrap();
        let artifacts = client.list_artifacts(&path).await.unwrap();
        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["model", "accuracy"]);
    }

    #[tokio::test]
    async fn test_get_artifact_value_and_type() {
        let client = fixture();
        let path: TaskPath = "Train/2/fit/3".parse().unwrap();
        let artifact = client.get_artifact(&path, "accuracy").await.unwrap();
        assert_eq!(artifact.type_name, "float");
        assert_eq!(artifact.value, json!(0.91));

        let err = client.get_artifact(&path, "nope").await.unwrap_err();
        assert_eq!(err.kind_name(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_task_lookup_errors_name_the_missing_level() {
        let client = fixture();
        let bad_step: TaskPath = "Train/2/deploy/3".parse().unwrap();
        assert!(client
            .get_task_logs(&bad_step)
            .await
            .unwrap_err()
            .to_string()
            .contains("step not found"));

        let bad_task: TaskPath = "Train/2/fit/99".parse().unwrap();
        assert!(client
            .get_task_logs(&bad_task)
            .await
            .unwrap_err()
            .to_string()
            .contains("task not found"));
    }
}

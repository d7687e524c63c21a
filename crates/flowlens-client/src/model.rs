//! Core data model for workflow runs, steps, tasks, and artifacts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Lifecycle state of a run or task. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether the run/task has reached a terminal state.
    pub fn finished(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Whether the run/task finished successfully.
    pub fn successful(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// A flow (workflow definition) visible in the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Flow name (e.g. "TrainingFlow").
    pub id: String,
    /// Number of runs recorded for this flow.
    #[serde(default)]
    pub num_runs: usize,
}

/// One execution instance of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    /// Run pathspec, "FlowName/RunNumber".
    pub pathspec: String,
    /// Run number within the flow.
    pub id: String,
    /// Owning flow name.
    pub flow: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Namespace the run was recorded under (e.g. "user:amy", "prod:etl").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// User-assigned tags, sorted.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunInfo {
    pub fn finished(&self) -> bool {
        self.status.finished()
    }

    pub fn successful(&self) -> bool {
        self.status.successful()
    }
}

/// A named stage of a run. Steps are ordered by execution order; parallel
/// steps may overlap in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// One execution unit within a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Exception repr if the task failed with one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl TaskInfo {
    pub fn finished(&self) -> bool {
        self.status.finished()
    }

    pub fn successful(&self) -> bool {
        self.status.successful()
    }
}

/// Artifact metadata, without the value loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub name: String,
    /// Content hash of the serialized value.
    pub sha: String,
    pub created_at: DateTime<Utc>,
}

/// A materialized artifact value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactValue {
    pub name: String,
    /// Type name of the stored value (e.g. "dict", "DataFrame").
    pub type_name: String,
    pub value: serde_json::Value,
}

/// Captured stdout/stderr for a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskLogs {
    pub stdout: String,
    pub stderr: String,
}

/// Parsed "FlowName/RunNumber" pathspec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPath {
    pub flow: String,
    pub run: String,
}

impl RunPath {
    pub fn new(flow: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            run: run.into(),
        }
    }

    /// Extend with step and task identifiers.
    pub fn task(&self, step: impl Into<String>, task: impl Into<String>) -> TaskPath {
        TaskPath {
            flow: self.flow.clone(),
            run: self.run.clone(),
            step: step.into(),
            task: task.into(),
        }
    }
}

impl fmt::Display for RunPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flow, self.run)
    }
}

impl FromStr for RunPath {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [flow, run] if !flow.is_empty() && !run.is_empty() => {
                Ok(RunPath::new(*flow, *run))
            }
            _ => Err(ClientError::InvalidArgument(format!(
                "expected run id of the form 'FlowName/RunNumber', got '{s}'"
            ))),
        }
    }
}

/// Parsed "FlowName/RunNumber/StepName/TaskId" pathspec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPath {
    pub flow: String,
    pub run: String,
    pub step: String,
    pub task: String,
}

impl TaskPath {
    pub fn run_path(&self) -> RunPath {
        RunPath::new(self.flow.clone(), self.run.clone())
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.flow, self.run, self.step, self.task)
    }
}

impl FromStr for TaskPath {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [flow, run, step, task]
                if [flow, run, step, task].iter().all(|p| !p.is_empty()) =>
            {
                Ok(TaskPath {
                    flow: (*flow).to_string(),
                    run: (*run).to_string(),
                    step: (*step).to_string(),
                    task: (*task).to_string(),
                })
            }
            _ => Err(ClientError::InvalidArgument(format!(
                "expected task id of the form 'Flow/Run/Step/Task', got '{s}'"
            ))),
        }
    }
}

/// Duration in seconds between two timestamps, rounded to one decimal.
/// `None` if the end is missing (still running).
pub fn duration_seconds(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Option<f64> {
    end.map(|e| {
        let millis = (e - start).num_milliseconds() as f64;
        (millis / 100.0).round() / 10.0
    })
}

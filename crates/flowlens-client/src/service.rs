//! HTTP implementation of `FlowClient` against a workflow metadata service.
//!
//! The service exposes a plain REST surface keyed by flow/run/step/task.
//! A 404 maps to `NotFound`; connection failures and server errors map to
//! `Backend`. Requests carry an explicit 30 second deadline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::client::FlowClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::model::{
    ArtifactInfo, ArtifactValue, FlowSummary, RunInfo, RunPath, StepInfo, TaskInfo, TaskLogs,
    TaskPath,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `FlowClient` backed by the metadata service named in `ClientConfig`.
pub struct ServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ServiceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.service_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(%url, "metadata service request");

        let mut request = self.http.get(&url);
        if let Some(ns) = &self.config.namespace {
            request = request.query(&[("ns", ns.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Backend(format!("request to {url} failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::not_found(kind, id)),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| ClientError::Backend(format!("bad response from {url}: {e}"))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Backend(format!(
                    "{url} returned {status}: {body}"
                )))
            }
        }
    }
}

#[async_trait]
impl FlowClient for ServiceClient {
    async fn list_flows(&self) -> Result<Vec<FlowSummary>> {
        self.get_json("flows", "flow", "(all)").await
    }

    async fn list_runs(&self, flow: &str, limit: usize) -> Result<Vec<RunInfo>> {
        let mut runs: Vec<RunInfo> = self
            .get_json(&format!("flows/{flow}/runs"), "flow", flow)
            .await?;
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn get_run(&self, path: &RunPath) -> Result<RunInfo> {
        self.get_json(
            &format!("flows/{}/runs/{}", path.flow, path.run),
            "run",
            &path.to_string(),
        )
        .await
    }

    async fn list_steps(&self, path: &RunPath) -> Result<Vec<StepInfo>> {
        self.get_json(
            &format!("flows/{}/runs/{}/steps", path.flow, path.run),
            "run",
            &path.to_string(),
        )
        .await
    }

    async fn list_tasks(&self, path: &RunPath, step: &str) -> Result<Vec<TaskInfo>> {
        self.get_json(
            &format!("flows/{}/runs/{}/steps/{step}/tasks", path.flow, path.run),
            "step",
            &format!("{path}/{step}"),
        )
        .await
    }

    async fn get_task_logs(&self, path: &TaskPath) -> Result<TaskLogs> {
        self.get_json(
            &format!(
                "flows/{}/runs/{}/steps/{}/tasks/{}/logs",
                path.flow, path.run, path.step, path.task
            ),
            "task",
            &path.to_string(),
        )
        .await
    }

    async fn list_artifacts(&self, path: &TaskPath) -> Result<Vec<ArtifactInfo>> {
        self.get_json(
            &format!(
                "flows/{}/runs/{}/steps/{}/tasks/{}/artifacts",
                path.flow, path.run, path.step, path.task
            ),
            "task",
            &path.to_string(),
        )
        .await
    }

    async fn get_artifact(&self, path: &TaskPath, name: &str) -> Result<ArtifactValue> {
        self.get_json(
            &format!(
                "flows/{}/runs/{}/steps/{}/tasks/{}/artifacts/{name}",
                path.flow, path.run, path.step, path.task
            ),
            "artifact",
            &format!("{path}: {name}"),
        )
        .await
    }
}

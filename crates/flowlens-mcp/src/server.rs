//! The tool facade: ten read-only tools over a `FlowClient`.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};

use flowlens_client::{
    ClientConfig, ClientError, FlowClient, LogFilter, RunInfo, RunPath, TaskPath,
};

/// Runs scanned per flow before a time-window search gives up.
const MAX_SCAN: usize = 200;

/// Characters of stderr kept when reporting a failing task.
const STDERR_TAIL_CHARS: usize = 2000;

// ========== Request types ==========

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListFlowsRequest {
    #[schemars(description = "Max number of flows to return (default 50)")]
    pub last_n: Option<usize>,
    #[schemars(
        description = "Only list flows with runs in this namespace (e.g. \"user:amy\" from get_config)"
    )]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRunsRequest {
    #[schemars(description = "Name of the flow (e.g. \"TrainingFlow\")")]
    pub flow_name: String,
    #[schemars(description = "Max number of matching runs to return (default 5)")]
    pub last_n: Option<usize>,
    #[schemars(description = "Filter by status: \"successful\", \"failed\", or \"running\"")]
    pub status: Option<String>,
    #[schemars(
        description = "ISO datetime -- only runs created after this time (e.g. \"2024-01-15\" or \"2024-01-15T10:30:00\")"
    )]
    pub created_after: Option<String>,
    #[schemars(description = "ISO datetime -- only runs created before this time")]
    pub created_before: Option<String>,
    #[schemars(description = "Only include runs that carry all of these user tags")]
    pub tags: Option<Vec<String>>,
    #[schemars(
        description = "Only include runs in this namespace (e.g. \"user:amy\" from get_config)"
    )]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetRunRequest {
    #[schemars(description = "Run id like \"FlowName/RunNumber\"")]
    pub run_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetTaskLogsRequest {
    #[schemars(description = "Run id like \"FlowName/RunNumber\"")]
    pub run_id: String,
    #[schemars(description = "Step name within the run")]
    pub step: String,
    #[schemars(description = "Task id within the step")]
    pub task: String,
    #[schemars(description = "Include stdout (default true)")]
    pub stdout: Option<bool>,
    #[schemars(description = "Include stderr (default true)")]
    pub stderr: Option<bool>,
    #[schemars(description = "Return only the first N lines of each log (ignored if tail is set)")]
    pub head: Option<usize>,
    #[schemars(description = "Return only the last N lines of each log")]
    pub tail: Option<usize>,
    #[schemars(description = "Regex -- return only lines matching this pattern")]
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListArtifactsRequest {
    #[schemars(description = "Run id like \"FlowName/RunNumber\"")]
    pub run_id: String,
    #[schemars(description = "Step name within the run")]
    pub step: String,
    #[schemars(description = "Task id within the step")]
    pub task: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetArtifactRequest {
    #[schemars(description = "Run id like \"FlowName/RunNumber\"")]
    pub run_id: String,
    #[schemars(description = "Step name within the run")]
    pub step: String,
    #[schemars(description = "Task id within the step")]
    pub task: String,
    #[schemars(description = "Artifact name (e.g. \"model\", \"result\")")]
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetLatestFailureRequest {
    #[schemars(description = "Name of the flow")]
    pub flow_name: String,
    #[schemars(description = "How many recent runs to scan (default 20)")]
    pub last_n_runs: Option<usize>,
    #[schemars(
        description = "Only consider runs in this namespace (e.g. \"user:amy\" from get_config)"
    )]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetRecentRunsRequest {
    #[schemars(
        description = "Namespace to scan (e.g. \"user:amy\" -- get your default from get_config)"
    )]
    pub namespace: String,
    #[schemars(description = "How many flows to scan (default 20)")]
    pub last_n_flows: Option<usize>,
    #[schemars(description = "How many recent runs to take per flow (default 3)")]
    pub last_n_runs_per_flow: Option<usize>,
    #[schemars(description = "Filter by status: \"successful\", \"failed\", or \"running\"")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchArtifactsRequest {
    #[schemars(description = "Name of the flow")]
    pub flow_name: String,
    #[schemars(description = "Name of the artifact to search for (e.g. \"model\", \"accuracy\")")]
    pub artifact_name: String,
    #[schemars(description = "Number of recent runs to scan (default 5)")]
    pub last_n_runs: Option<usize>,
    #[schemars(description = "Only search within this step. Recommended for large flows")]
    pub step_name: Option<String>,
}

// ========== Server ==========

/// MCP handler wrapping a `FlowClient`. Stateless and reentrant; one stdio
/// session per process.
#[derive(Clone)]
pub struct FlowTools {
    client: Arc<dyn FlowClient>,
    config: ClientConfig,
    tool_router: ToolRouter<Self>,
}

impl FlowTools {
    pub fn new(client: Arc<dyn FlowClient>, config: ClientConfig) -> Self {
        Self {
            client,
            config,
            tool_router: Self::tool_router(),
        }
    }
}

/// Serialize a query outcome into the tool reply. Errors travel through the
/// normal result channel as a structured payload so one bad call never
/// takes the session down.
fn reply(result: Result<Value, ClientError>) -> Result<String, String> {
    let payload = match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind_name(), "tool call failed");
            json!({ "error": e.kind_name(), "message": e.to_string() })
        }
    };
    serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())
}

fn require(value: &str, field: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::InvalidArgument(format!(
            "{field} must not be empty"
        )))
    } else {
        Ok(())
    }
}

/// Parse an ISO datetime, date-only form included, assuming UTC when no
/// offset is given.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, ClientError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
    }
    Err(ClientError::InvalidArgument(format!(
        "could not parse datetime '{s}'"
    )))
}

fn status_matches(run: &RunInfo, filter: &str) -> Result<bool, ClientError> {
    match filter {
        "successful" => Ok(run.successful()),
        "failed" => Ok(run.finished() && !run.successful()),
        "running" => Ok(!run.finished()),
        other => Err(ClientError::InvalidArgument(format!(
            "unknown status filter '{other}' (expected successful, failed, or running)"
        ))),
    }
}

fn in_namespace(run: &RunInfo, ns: Option<&str>) -> bool {
    match ns {
        Some(ns) => run.namespace.as_deref() == Some(ns),
        None => true,
    }
}

fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn iso_opt(dt: Option<DateTime<Utc>>) -> Value {
    dt.map(|d| json!(iso(d))).unwrap_or(Value::Null)
}

fn run_summary(run: &RunInfo) -> Value {
    json!({
        "pathspec": run.pathspec,
        "id": run.id,
        "successful": run.successful(),
        "finished": run.finished(),
        "created_at": iso(run.created_at),
        "finished_at": iso_opt(run.finished_at),
        "tags": run.tags,
    })
}

// ========== Queries ==========
//
// One method per tool, returning plain JSON. The #[tool] wrappers below
// only adapt these to the protocol; tests exercise the queries directly.

impl FlowTools {
    async fn config_query(&self) -> Result<Value, ClientError> {
        let active = match &self.config.namespace {
            Some(ns) => ns.clone(),
            None => "global (all runs visible)".to_string(),
        };
        Ok(json!({
            "metadata_provider": self.config.service_url,
            "active_namespace": active,
            "default_namespace": self.config.default_user_namespace(),
            "default_datastore": self.config.datastore,
            "profile": self.config.profile.as_deref().unwrap_or("(not set)"),
        }))
    }

    /// The namespace a call runs under: the per-call override when given,
    /// otherwise the configured one. `None` means global.
    fn effective_namespace<'a>(&'a self, override_ns: Option<&'a str>) -> Option<&'a str> {
        override_ns.or(self.config.namespace.as_deref())
    }

    async fn list_flows_query(&self, req: &ListFlowsRequest) -> Result<Value, ClientError> {
        let last_n = req.last_n.unwrap_or(50);
        let ns = self.effective_namespace(req.namespace.as_deref());
        let flows = self.client.list_flows().await?;

        let mut names = Vec::new();
        for flow in &flows {
            if let Some(ns) = ns {
                // A flow is visible in a namespace only if one of its recent
                // runs belongs to it.
                let runs = self.client.list_runs(&flow.id, MAX_SCAN).await?;
                if !runs.iter().any(|r| in_namespace(r, Some(ns))) {
                    continue;
                }
            }
            names.push(flow.id.as_str());
            if names.len() >= last_n {
                break;
            }
        }

        Ok(json!({
            "flows": names,
            "count": names.len(),
            "namespace": ns.unwrap_or("global"),
        }))
    }

    async fn search_runs_query(&self, req: &SearchRunsRequest) -> Result<Value, ClientError> {
        require(&req.flow_name, "flow_name")?;
        let last_n = req.last_n.unwrap_or(5);
        let after = req.created_after.as_deref().map(parse_datetime).transpose()?;
        let before = req
            .created_before
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        let ns = self.effective_namespace(req.namespace.as_deref());
        let scanned = self.client.list_runs(&req.flow_name, MAX_SCAN).await?;
        let mut runs = Vec::new();
        for run in &scanned {
            // Runs are newest-first: once past the window start, stop.
            if let Some(after) = after {
                if run.created_at < after {
                    break;
                }
            }
            if let Some(before) = before {
                if run.created_at > before {
                    continue;
                }
            }
            if !in_namespace(run, ns) {
                continue;
            }
            if let Some(status) = &req.status {
                if !status_matches(run, status)? {
                    continue;
                }
            }
            if let Some(tags) = &req.tags {
                if !tags.iter().all(|t| run.tags.contains(t)) {
                    continue;
                }
            }
            runs.push(run_summary(run));
            if runs.len() >= last_n {
                break;
            }
        }

        Ok(json!({
            "flow": req.flow_name,
            "count": runs.len(),
            "namespace": ns.unwrap_or("global"),
            "runs": runs,
        }))
    }

    async fn get_run_query(&self, req: &GetRunRequest) -> Result<Value, ClientError> {
        let path = RunPath::from_str(&req.run_id)?;
        let run = self.client.get_run(&path).await?;

        let mut steps = Vec::new();
        for step in self.client.list_steps(&path).await? {
            let mut tasks = Vec::new();
            for task in self.client.list_tasks(&path, &step.name).await? {
                tasks.push(json!({
                    "id": task.id,
                    "successful": task.successful(),
                    "finished": task.finished(),
                    "created_at": iso(task.created_at),
                    "finished_at": iso_opt(task.finished_at),
                    "duration_seconds": flowlens_client::duration_seconds(
                        task.created_at,
                        task.finished_at,
                    ),
                }));
            }
            steps.push(json!({
                "step": step.name,
                "created_at": iso(step.created_at),
                "tasks": tasks,
            }));
        }

        Ok(json!({
            "pathspec": run.pathspec,
            "successful": run.successful(),
            "finished": run.finished(),
            "created_at": iso(run.created_at),
            "finished_at": iso_opt(run.finished_at),
            "duration_seconds": flowlens_client::duration_seconds(run.created_at, run.finished_at),
            "tags": run.tags,
            "steps": steps,
        }))
    }

    async fn task_logs_query(&self, req: &GetTaskLogsRequest) -> Result<Value, ClientError> {
        let path = self.task_path(&req.run_id, &req.step, &req.task)?;
        let filter = LogFilter {
            head: req.head,
            tail: req.tail,
            pattern: req.pattern.clone(),
        };
        let logs = self.client.get_task_logs(&path).await?;

        let mut result = serde_json::Map::new();
        result.insert("pathspec".into(), json!(path.to_string()));
        if req.stdout.unwrap_or(true) {
            result.insert("stdout".into(), json!(filter.apply(&logs.stdout)?));
        }
        if req.stderr.unwrap_or(true) {
            result.insert("stderr".into(), json!(filter.apply(&logs.stderr)?));
        }
        Ok(Value::Object(result))
    }

    async fn list_artifacts_query(&self, req: &ListArtifactsRequest) -> Result<Value, ClientError> {
        let path = self.task_path(&req.run_id, &req.step, &req.task)?;
        let artifacts: Vec<Value> = self
            .client
            .list_artifacts(&path)
            .await?
            .iter()
            .map(|a| {
                json!({
                    "name": a.name,
                    "sha": a.sha,
                    "created_at": iso(a.created_at),
                })
            })
            .collect();
        Ok(json!({
            "pathspec": path.to_string(),
            "artifacts": artifacts,
        }))
    }

    async fn get_artifact_query(&self, req: &GetArtifactRequest) -> Result<Value, ClientError> {
        require(&req.name, "name")?;
        let path = self.task_path(&req.run_id, &req.step, &req.task)?;
        let artifact = self.client.get_artifact(&path, &req.name).await?;
        Ok(json!({
            "pathspec": path.to_string(),
            "name": artifact.name,
            "type": artifact.type_name,
            "value": artifact.value,
        }))
    }

    async fn latest_failure_query(
        &self,
        req: &GetLatestFailureRequest,
    ) -> Result<Value, ClientError> {
        require(&req.flow_name, "flow_name")?;
        let last_n = req.last_n_runs.unwrap_or(20);
        let ns = self.effective_namespace(req.namespace.as_deref());
        let runs = self.client.list_runs(&req.flow_name, last_n).await?;
        let scanned = runs.len();

        let mut failures = Vec::new();
        for run in runs
            .iter()
            .filter(|r| in_namespace(r, ns) && r.finished() && !r.successful())
        {
            let path = RunPath::new(&run.flow, &run.id);
            let mut failure = json!({
                "run": run.pathspec,
                "created_at": iso(run.created_at),
                "failing_step": Value::Null,
                "failing_task": Value::Null,
                "exception": Value::Null,
                "stderr_tail": Value::Null,
            });

            'steps: for step in self.client.list_steps(&path).await? {
                for task in self.client.list_tasks(&path, &step.name).await? {
                    if task.finished() && !task.successful() {
                        let task_path = path.task(&step.name, &task.id);
                        let stderr_tail = self
                            .client
                            .get_task_logs(&task_path)
                            .await
                            .map(|logs| tail_chars(&logs.stderr, STDERR_TAIL_CHARS))
                            .unwrap_or_default();
                        failure = json!({
                            "run": run.pathspec,
                            "created_at": iso(run.created_at),
                            "failing_step": step.name,
                            "failing_task": task_path.to_string(),
                            "exception": task.exception,
                            "stderr_tail": stderr_tail,
                        });
                        break 'steps;
                    }
                }
            }

            if failure["failing_task"].is_null() {
                failure["note"] = json!("Run failed but could not identify failing task");
            }
            failures.push(failure);
        }

        Ok(json!({
            "flow": req.flow_name,
            "runs_scanned": scanned,
            "namespace": ns.unwrap_or("global"),
            "failures_found": failures.len(),
            "failures": failures,
        }))
    }

    async fn recent_runs_query(&self, req: &GetRecentRunsRequest) -> Result<Value, ClientError> {
        require(&req.namespace, "namespace")?;
        let last_n_flows = req.last_n_flows.unwrap_or(20);
        let per_flow = req.last_n_runs_per_flow.unwrap_or(3);

        let mut flows = self.client.list_flows().await?;
        flows.truncate(last_n_flows);

        let mut matched: Vec<&RunInfo> = Vec::new();
        let mut per_flow_runs = Vec::new();
        for flow in &flows {
            per_flow_runs.push(self.client.list_runs(&flow.id, MAX_SCAN).await?);
        }
        for runs in &per_flow_runs {
            let mut taken = 0usize;
            for run in runs.iter().filter(|r| in_namespace(r, Some(&req.namespace))) {
                if taken >= per_flow {
                    break;
                }
                // The per-flow cap bounds runs considered, not runs matched:
                // a status filter narrows within the window, it does not
                // extend the scan.
                taken += 1;
                if let Some(status) = &req.status {
                    if !status_matches(run, status)? {
                        continue;
                    }
                }
                matched.push(run);
            }
        }
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let entries: Vec<Value> = matched
            .iter()
            .map(|run| {
                json!({
                    "pathspec": run.pathspec,
                    "flow": run.flow,
                    "successful": run.successful(),
                    "finished": run.finished(),
                    "created_at": iso(run.created_at),
                    "finished_at": iso_opt(run.finished_at),
                    "duration_seconds": flowlens_client::duration_seconds(
                        run.created_at,
                        run.finished_at,
                    ),
                    "tags": run.tags,
                })
            })
            .collect();

        Ok(json!({
            "namespace": req.namespace,
            "flows_scanned": flows.len(),
            "runs_found": entries.len(),
            "runs": entries,
        }))
    }

    async fn search_artifacts_query(
        &self,
        req: &SearchArtifactsRequest,
    ) -> Result<Value, ClientError> {
        require(&req.flow_name, "flow_name")?;
        require(&req.artifact_name, "artifact_name")?;
        let last_n = req.last_n_runs.unwrap_or(5);
        let runs = self.client.list_runs(&req.flow_name, last_n).await?;
        let scanned = runs.len();

        let mut matches = Vec::new();
        for run in &runs {
            let path = RunPath::new(&run.flow, &run.id);
            for step in self.client.list_steps(&path).await? {
                if let Some(only) = &req.step_name {
                    if step.name != *only {
                        continue;
                    }
                }
                for task in self.client.list_tasks(&path, &step.name).await? {
                    let task_path = path.task(&step.name, &task.id);
                    let artifacts = self.client.list_artifacts(&task_path).await?;
                    if let Some(art) = artifacts.iter().find(|a| a.name == req.artifact_name) {
                        matches.push(json!({
                            "task": task_path.to_string(),
                            "step": step.name,
                            "run": run.pathspec,
                            "created_at": iso(art.created_at),
                            "sha": art.sha,
                        }));
                    }
                }
            }
        }

        Ok(json!({
            "flow": req.flow_name,
            "artifact_name": req.artifact_name,
            "runs_scanned": scanned,
            "matches_found": matches.len(),
            "matches": matches,
        }))
    }

    fn task_path(&self, run_id: &str, step: &str, task: &str) -> Result<TaskPath, ClientError> {
        require(step, "step")?;
        require(task, "task")?;
        let run = RunPath::from_str(run_id)?;
        Ok(run.task(step, task))
    }
}

// ========== Tools ==========

#[tool_router]
impl FlowTools {
    #[tool(
        description = "Show the current backend configuration: metadata provider, active namespace, default datastore, and profile. Also returns the user's default namespace (e.g. \"user:amy\") -- pass it as the namespace parameter to list_flows/search_runs/get_latest_failure/get_recent_runs to scope results to your own runs. Use this first to understand what backend you're connected to.")]
    async fn get_config(&self) -> Result<String, String> {
        reply(self.config_query().await)
    }

    #[tool(
        description = "List available flows. Use this to discover flows before searching for runs.")]
    async fn list_flows(
        &self,
        Parameters(req): Parameters<ListFlowsRequest>,
    ) -> Result<String, String> {
        reply(self.list_flows_query(&req).await)
    }

    #[tool(
        description = "Find recent runs of a flow with optional status, time-window, and tag filters. Runs come back newest first; never more than last_n.")]
    async fn search_runs(
        &self,
        Parameters(req): Parameters<SearchRunsRequest>,
    ) -> Result<String, String> {
        reply(self.search_runs_query(&req).await)
    }

    #[tool(
        description = "Get detailed status of a run including the per-step, per-task breakdown with durations.")]
    async fn get_run(&self, Parameters(req): Parameters<GetRunRequest>) -> Result<String, String> {
        reply(self.get_run_query(&req).await)
    }

    #[tool(
        description = "Get stdout/stderr logs for a specific task, with optional head/tail/regex filtering.")]
    async fn get_task_logs(
        &self,
        Parameters(req): Parameters<GetTaskLogsRequest>,
    ) -> Result<String, String> {
        reply(self.task_logs_query(&req).await)
    }

    #[tool(
        description = "List all artifacts produced by a task. Returns names and metadata without loading values; use get_artifact to retrieve one.")]
    async fn list_artifacts(
        &self,
        Parameters(req): Parameters<ListArtifactsRequest>,
    ) -> Result<String, String> {
        reply(self.list_artifacts_query(&req).await)
    }

    #[tool(
        description = "Get the value of a named data artifact from a task.")]
    async fn get_artifact(
        &self,
        Parameters(req): Parameters<GetArtifactRequest>,
    ) -> Result<String, String> {
        reply(self.get_artifact_query(&req).await)
    }

    #[tool(
        description = "Scan recent runs of a flow for failures and return error details: failing step and task, exception, and a stderr tail. The most recent failure comes first.")]
    async fn get_latest_failure(
        &self,
        Parameters(req): Parameters<GetLatestFailureRequest>,
    ) -> Result<String, String> {
        reply(self.latest_failure_query(&req).await)
    }

    #[tool(
        description = "List recent runs across all flows in a namespace, newest first. Answers \"what ran recently?\" -- get the namespace from get_config. Scans up to last_n_flows flows, taking up to last_n_runs_per_flow recent runs from each.")]
    async fn get_recent_runs(
        &self,
        Parameters(req): Parameters<GetRecentRunsRequest>,
    ) -> Result<String, String> {
        reply(self.recent_runs_query(&req).await)
    }

    #[tool(
        description = "Search for a named artifact across recent runs of a flow without loading data. Use step_name to narrow the search on large flows.")]
    async fn search_artifacts(
        &self,
        Parameters(req): Parameters<SearchArtifactsRequest>,
    ) -> Result<String, String> {
        reply(self.search_artifacts_query(&req).await)
    }
}

#[tool_handler]
impl ServerHandler for FlowTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Read-only tools for inspecting workflow runs: discover flows \
                 (list_flows), find runs (search_runs, get_recent_runs), drill \
                 into a run (get_run), read task logs (get_task_logs), inspect \
                 artifacts (list_artifacts, get_artifact, search_artifacts), \
                 and debug failures (get_latest_failure). Call get_config \
                 first to see which backend and namespace you are looking at. \
                 Run ids are \"FlowName/RunNumber\"."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlens_client::{InMemoryClient, RunFixture, RunStatus, StepFixture, TaskFixture};
    use serde_json::json;

    fn facade(client: InMemoryClient) -> FlowTools {
        let config = ClientConfig {
            service_url: "http://localhost:8080".into(),
            namespace: None,
            datastore: "local".into(),
            profile: None,
        };
        FlowTools::new(Arc::new(client), config)
    }

    /// Pipeline: R1 success, R2 failure, R3 success (R3 newest).
    fn pipeline_fixture() -> InMemoryClient {
        let mut client = InMemoryClient::new();
        client.add_run(
            RunFixture::new("Pipeline", "1", RunStatus::Completed, 0)
                .with_tags(&["nightly"])
                .with_step(
                    StepFixture::new("end", 0).with_task(
                        TaskFixture::new("1", RunStatus::Completed, 0)
                            .with_artifact("report", json!("ok"))
                            .with_artifact("rows", json!(120)),
                    ),
                ),
        );
        client.add_run(
            RunFixture::new("Pipeline", "2", RunStatus::Failed, 10).with_step(
                StepFixture::new("transform", 10).with_task(
                    TaskFixture::new("4", RunStatus::Failed, 10)
                        .with_logs("reading input\n", "boom\nKeyError: 'user_id'\n")
                        .with_exception("KeyError('user_id')"),
                ),
            ),
        );
        client.add_run(RunFixture::new("Pipeline", "3", RunStatus::Completed, 20));
        client
    }

    /// A flow with exactly ten finished runs.
    fn ten_run_fixture() -> InMemoryClient {
        let mut client = InMemoryClient::new();
        for i in 0..10 {
            client.add_run(RunFixture::new(
                "Daily",
                &format!("{}", i + 1),
                RunStatus::Completed,
                i * 5,
            ));
        }
        client
    }

    /// Runs owned by two users across two flows. Deploy/7 is the newest
    /// of amy's runs; Train/2 belongs to bob and is the only failure.
    fn namespaced_fixture() -> InMemoryClient {
        let mut client = InMemoryClient::new();
        client.add_run(
            RunFixture::new("Train", "1", RunStatus::Completed, 0).with_namespace("user:amy"),
        );
        client.add_run(
            RunFixture::new("Train", "2", RunStatus::Failed, 10)
                .with_namespace("user:bob")
                .with_step(
                    StepFixture::new("fit", 10).with_task(
                        TaskFixture::new("1", RunStatus::Failed, 10)
                            .with_exception("ValueError('bad split')"),
                    ),
                ),
        );
        client.add_run(
            RunFixture::new("Deploy", "7", RunStatus::Completed, 5).with_namespace("user:amy"),
        );
        client
    }

    #[tokio::test]
    async fn test_search_runs_namespace_scopes_results() {
        let tools = facade(namespaced_fixture());
        let req = SearchRunsRequest {
            flow_name: "Train".into(),
            last_n: Some(10),
            status: None,
            created_after: None,
            created_before: None,
            tags: None,
            namespace: Some("user:amy".into()),
        };
        let result = tools.search_runs_query(&req).await.unwrap();
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["runs"][0]["pathspec"], json!("Train/1"));
        assert_eq!(result["namespace"], json!("user:amy"));
    }

    #[tokio::test]
    async fn test_list_flows_namespace_hides_foreign_flows() {
        let tools = facade(namespaced_fixture());
        let req = ListFlowsRequest {
            last_n: None,
            namespace: Some("user:bob".into()),
        };
        let result = tools.list_flows_query(&req).await.unwrap();
        assert_eq!(result["flows"], json!(["Train"]));
        assert_eq!(result["namespace"], json!("user:bob"));
    }

    #[tokio::test]
    async fn test_latest_failure_skips_runs_outside_namespace() {
        let tools = facade(namespaced_fixture());
        let req = GetLatestFailureRequest {
            flow_name: "Train".into(),
            last_n_runs: None,
            namespace: Some("user:amy".into()),
        };
        let result = tools.latest_failure_query(&req).await.unwrap();
        // Train/2 failed, but it is bob's run.
        assert_eq!(result["failures_found"], json!(0));
    }

    #[tokio::test]
    async fn test_recent_runs_merges_flows_newest_first() {
        let tools = facade(namespaced_fixture());
        let req = GetRecentRunsRequest {
            namespace: "user:amy".into(),
            last_n_flows: None,
            last_n_runs_per_flow: None,
            status: None,
        };
        let result = tools.recent_runs_query(&req).await.unwrap();
        assert_eq!(result["flows_scanned"], json!(2));
        assert_eq!(result["runs_found"], json!(2));
        assert_eq!(result["runs"][0]["pathspec"], json!("Deploy/7"));
        assert_eq!(result["runs"][0]["flow"], json!("Deploy"));
        assert_eq!(result["runs"][1]["pathspec"], json!("Train/1"));
        assert!(result["runs"][0]["duration_seconds"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_recent_runs_per_flow_cap_counts_before_status_filter() {
        // Night's newest run failed; with a window of one run per flow a
        // "successful" filter finds nothing, even though an older success
        // exists outside the window.
        let mut client = InMemoryClient::new();
        client.add_run(
            RunFixture::new("Night", "1", RunStatus::Completed, 0).with_namespace("user:amy"),
        );
        client.add_run(
            RunFixture::new("Night", "2", RunStatus::Failed, 10).with_namespace("user:amy"),
        );
        let tools = facade(client);
        let req = GetRecentRunsRequest {
            namespace: "user:amy".into(),
            last_n_flows: None,
            last_n_runs_per_flow: Some(1),
            status: Some("successful".into()),
        };
        let result = tools.recent_runs_query(&req).await.unwrap();
        assert_eq!(result["runs_found"], json!(0));
    }

    #[tokio::test]
    async fn test_recent_runs_requires_namespace() {
        let tools = facade(namespaced_fixture());
        let req = GetRecentRunsRequest {
            namespace: "  ".into(),
            last_n_flows: None,
            last_n_runs_per_flow: None,
            status: None,
        };
        let err = tools.recent_runs_query(&req).await.unwrap_err();
        assert_eq!(err.kind_name(), "InvalidArgumentError");
    }

    #[tokio::test]
    async fn test_search_runs_returns_all_ten_when_exactly_ten_exist() {
        let tools = facade(ten_run_fixture());
        let req = SearchRunsRequest {
            flow_name: "Daily".into(),
            last_n: Some(10),
            status: None,
            created_after: None,
            created_before: None,
            tags: None,
            namespace: None,
        };
        let result = tools.search_runs_query(&req).await.unwrap();
        assert_eq!(result["count"], json!(10));
    }

    #[tokio::test]
    async fn test_search_runs_never_exceeds_last_n() {
        let tools = facade(ten_run_fixture());
        let req = SearchRunsRequest {
            flow_name: "Daily".into(),
            last_n: Some(3),
            status: None,
            created_after: None,
            created_before: None,
            tags: None,
            namespace: None,
        };
        let result = tools.search_runs_query(&req).await.unwrap();
        assert_eq!(result["count"], json!(3));
        // Newest first.
        assert_eq!(result["runs"][0]["pathspec"], json!("Daily/10"));
    }

    #[tokio::test]
    async fn test_search_runs_status_filter() {
        let tools = facade(pipeline_fixture());
        let req = SearchRunsRequest {
            flow_name: "Pipeline".into(),
            last_n: Some(10),
            status: Some("failed".into()),
            created_after: None,
            created_before: None,
            tags: None,
            namespace: None,
        };
        let result = tools.search_runs_query(&req).await.unwrap();
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["runs"][0]["pathspec"], json!("Pipeline/2"));
    }

    #[tokio::test]
    async fn test_search_runs_tag_filter() {
        let tools = facade(pipeline_fixture());
        let req = SearchRunsRequest {
            flow_name: "Pipeline".into(),
            last_n: Some(10),
            status: None,
            created_after: None,
            created_before: None,
            tags: Some(vec!["nightly".into()]),
            namespace: None,
        };
        let result = tools.search_runs_query(&req).await.unwrap();
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["runs"][0]["pathspec"], json!("Pipeline/1"));
    }

    #[tokio::test]
    async fn test_search_runs_unknown_status_is_invalid() {
        let tools = facade(pipeline_fixture());
        let req = SearchRunsRequest {
            flow_name: "Pipeline".into(),
            last_n: None,
            status: Some("green".into()),
            created_after: None,
            created_before: None,
            tags: None,
            namespace: None,
        };
        let err = tools.search_runs_query(&req).await.unwrap_err();
        assert_eq!(err.kind_name(), "InvalidArgumentError");
    }

    #[tokio::test]
    async fn test_latest_failure_returns_middle_run() {
        // [R1 success, R2 failure, R3 success] -> R2's details, not R3's.
        let tools = facade(pipeline_fixture());
        let req = GetLatestFailureRequest {
            flow_name: "Pipeline".into(),
            last_n_runs: None,
            namespace: None,
        };
        let result = tools.latest_failure_query(&req).await.unwrap();
        assert_eq!(result["failures_found"], json!(1));
        let failure = &result["failures"][0];
        assert_eq!(failure["run"], json!("Pipeline/2"));
        assert_eq!(failure["failing_step"], json!("transform"));
        assert_eq!(failure["failing_task"], json!("Pipeline/2/transform/4"));
        assert_eq!(failure["exception"], json!("KeyError('user_id')"));
        assert!(failure["stderr_tail"]
            .as_str()
            .unwrap()
            .contains("KeyError"));
    }

    #[tokio::test]
    async fn test_list_artifacts_names_and_order() {
        let tools = facade(pipeline_fixture());
        let req = ListArtifactsRequest {
            run_id: "Pipeline/1".into(),
            step: "end".into(),
            task: "1".into(),
        };
        let result = tools.list_artifacts_query(&req).await.unwrap();
        let names: Vec<&str> = result["artifacts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["report", "rows"]);
    }

    #[tokio::test]
    async fn test_get_artifact_value() {
        let tools = facade(pipeline_fixture());
        let req = GetArtifactRequest {
            run_id: "Pipeline/1".into(),
            step: "end".into(),
            task: "1".into(),
            name: "rows".into(),
        };
        let result = tools.get_artifact_query(&req).await.unwrap();
        assert_eq!(result["type"], json!("int"));
        assert_eq!(result["value"], json!(120));
    }

    #[tokio::test]
    async fn test_get_run_breakdown() {
        let tools = facade(pipeline_fixture());
        let req = GetRunRequest {
            run_id: "Pipeline/2".into(),
        };
        let result = tools.get_run_query(&req).await.unwrap();
        assert_eq!(result["successful"], json!(false));
        assert_eq!(result["steps"][0]["step"], json!("transform"));
        assert_eq!(result["steps"][0]["tasks"][0]["successful"], json!(false));
        assert!(result["duration_seconds"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_task_logs_tail_and_channel_selection() {
        let tools = facade(pipeline_fixture());
        let req = GetTaskLogsRequest {
            run_id: "Pipeline/2".into(),
            step: "transform".into(),
            task: "4".into(),
            stdout: Some(false),
            stderr: Some(true),
            head: None,
            tail: Some(1),
            pattern: None,
        };
        let result = tools.task_logs_query(&req).await.unwrap();
        assert!(result.get("stdout").is_none());
        assert_eq!(result["stderr"], json!("KeyError: 'user_id'\n"));
    }

    #[tokio::test]
    async fn test_search_artifacts_finds_producing_task() {
        let tools = facade(pipeline_fixture());
        let req = SearchArtifactsRequest {
            flow_name: "Pipeline".into(),
            artifact_name: "report".into(),
            last_n_runs: Some(5),
            step_name: None,
        };
        let result = tools.search_artifacts_query(&req).await.unwrap();
        assert_eq!(result["matches_found"], json!(1));
        assert_eq!(result["matches"][0]["task"], json!("Pipeline/1/end/1"));
    }

    #[tokio::test]
    async fn test_unknown_flow_surfaces_not_found_envelope() {
        let tools = facade(pipeline_fixture());
        let req = SearchRunsRequest {
            flow_name: "Nope".into(),
            last_n: None,
            status: None,
            created_after: None,
            created_before: None,
            tags: None,
            namespace: None,
        };
        let body = reply(tools.search_runs_query(&req).await).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"], json!("NotFoundError"));
        assert!(parsed["message"].as_str().unwrap().contains("Nope"));
    }

    #[tokio::test]
    async fn test_bad_run_id_is_invalid_argument() {
        let tools = facade(pipeline_fixture());
        let req = GetRunRequest {
            run_id: "not-a-pathspec".into(),
        };
        let err = tools.get_run_query(&req).await.unwrap_err();
        assert_eq!(err.kind_name(), "InvalidArgumentError");
    }

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime("2024-01-15").is_ok());
        assert!(parse_datetime("2024-01-15T10:30:00").is_ok());
        assert!(parse_datetime("2024-01-15T10:30:00+02:00").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_tail_chars_handles_multibyte() {
        assert_eq!(tail_chars("héllo", 2), "lo");
        assert_eq!(tail_chars("ab", 10), "ab");
    }

    #[test]
    fn test_config_query_reports_global_namespace() {
        let tools = facade(InMemoryClient::new());
        let result = futures_block(tools.config_query()).unwrap();
        assert_eq!(
            result["active_namespace"],
            json!("global (all runs visible)")
        );
        assert_eq!(result["default_datastore"], json!("local"));
    }

    /// Minimal block_on for the one non-async-capable test above.
    fn futures_block<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}

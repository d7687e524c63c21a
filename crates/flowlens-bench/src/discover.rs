//! Probe the live backend for flows with enough data to parameterize the
//! task suite.

use flowlens_client::{FlowClient, Result, RunPath};

/// Runs scanned per flow while probing.
const SCAN_RUNS: usize = 20;
/// Minimum runs a flow needs to be a benchmark candidate.
const MIN_RUNS: usize = 3;
/// Candidate flows kept before probing stops.
const MAX_FLOWS: usize = 5;

/// What a scan learned about one flow.
#[derive(Debug, Clone)]
pub struct FlowProbe {
    pub name: String,
    pub num_runs: usize,
    pub has_failure: bool,
}

/// Values discovered from the backend that task prompts interpolate.
/// Empty fields mean the matching tasks get skipped.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    pub flow_name: String,
    /// Run pathspec, "Flow/Run".
    pub run: String,
    /// Task pathspec, "Flow/Run/Step/Task".
    pub task: String,
    pub step: String,
    pub artifact: String,
    pub failed_flow: String,
}

/// Scan flows for benchmark candidates: enough runs, failure presence noted.
pub async fn discover_flows(client: &dyn FlowClient) -> Result<Vec<FlowProbe>> {
    let mut probes = Vec::new();
    for flow in client.list_flows().await? {
        let runs = client.list_runs(&flow.id, SCAN_RUNS).await?;
        if runs.len() < MIN_RUNS {
            continue;
        }
        let has_failure = runs.iter().any(|r| r.finished() && !r.successful());
        probes.push(FlowProbe {
            name: flow.id,
            num_runs: runs.len(),
            has_failure,
        });
        if probes.len() >= MAX_FLOWS {
            break;
        }
    }
    Ok(probes)
}

/// Pick the richest flow as primary and probe its newest finished run for
/// step, task, and artifact names. Internal artifacts (underscore prefix)
/// are skipped.
pub async fn build_test_context(
    client: &dyn FlowClient,
    probes: &[FlowProbe],
) -> Result<TestContext> {
    let mut ctx = TestContext::default();
    let Some(primary) = probes.iter().max_by_key(|p| p.num_runs) else {
        return Ok(ctx);
    };
    ctx.flow_name = primary.name.clone();

    ctx.failed_flow = probes
        .iter()
        .find(|p| p.has_failure)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| ctx.flow_name.clone());

    let runs = client.list_runs(&ctx.flow_name, SCAN_RUNS).await?;
    let Some(run) = runs.iter().find(|r| r.finished()) else {
        return Ok(ctx);
    };
    ctx.run = run.pathspec.clone();

    let path = RunPath::new(&run.flow, &run.id);
    'probe: for step in client.list_steps(&path).await? {
        ctx.step = step.name.clone();
        for task in client.list_tasks(&path, &step.name).await? {
            let task_path = path.task(&step.name, &task.id);
            ctx.task = task_path.to_string();
            let artifacts = client.list_artifacts(&task_path).await?;
            if let Some(art) = artifacts.iter().find(|a| !a.name.starts_with('_')) {
                ctx.artifact = art.name.clone();
                break 'probe;
            }
        }
    }

    Ok(ctx)
}

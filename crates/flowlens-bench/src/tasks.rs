//! The ten benchmark tasks and their reference answers.
//!
//! Reference answers are computed directly against the client so the judge
//! compares candidates to ground truth from the same backend the agent saw.

use std::str::FromStr;

use serde_json::{json, Value};

use flowlens_client::{ClientConfig, FlowClient, Result, RunInfo, RunPath, TaskPath};

use crate::discover::TestContext;

/// One benchmark task. Prompts are templates over the discovered context;
/// a task whose context is missing carries a skip reason instead.
#[derive(Debug, Clone)]
pub struct BenchmarkTask {
    pub id: &'static str,
    pub category: &'static str,
    pub prompt_template: &'static str,
    pub skip_reason: Option<&'static str>,
}

impl BenchmarkTask {
    pub fn runnable(&self) -> bool {
        self.skip_reason.is_none()
    }
}

/// Build the full suite, marking tasks whose context was not discovered.
pub fn build_tasks(ctx: &TestContext) -> Vec<BenchmarkTask> {
    let need_flow = if ctx.flow_name.is_empty() {
        Some("no flow discovered")
    } else {
        None
    };
    vec![
        BenchmarkTask {
            id: "simple_config",
            category: "simple",
            prompt_template:
                "What workflow backend am I connected to? Show the metadata provider and datastore.",
            skip_reason: None,
        },
        BenchmarkTask {
            id: "simple_list_runs",
            category: "simple",
            prompt_template:
                "List the last 3 runs of the flow '{flow_name}'. Show their pathspecs and whether they succeeded.",
            skip_reason: need_flow,
        },
        BenchmarkTask {
            id: "medium_run_details",
            category: "medium",
            prompt_template:
                "Show the step-by-step breakdown for run '{run}'. Include task statuses.",
            skip_reason: if ctx.run.is_empty() {
                Some("no run discovered")
            } else {
                None
            },
        },
        BenchmarkTask {
            id: "medium_task_logs",
            category: "medium",
            prompt_template: "Show the stdout and stderr logs for task '{task}'.",
            skip_reason: if ctx.task.is_empty() {
                Some("no task discovered")
            } else {
                None
            },
        },
        BenchmarkTask {
            id: "medium_artifact_inspect",
            category: "medium",
            prompt_template:
                "List the artifacts produced by task '{task}', then show the value of artifact '{artifact}'.",
            skip_reason: if ctx.task.is_empty() || ctx.artifact.is_empty() {
                Some("no artifact discovered")
            } else {
                None
            },
        },
        BenchmarkTask {
            id: "complex_latest_failure",
            category: "complex",
            prompt_template:
                "Find the most recent failed run of '{failed_flow}' (a run that finished but was not successful) and show the error details including the failing step and exception. If no failed runs exist, say so.",
            skip_reason: if ctx.failed_flow.is_empty() {
                Some("no failed flow discovered")
            } else {
                None
            },
        },
        BenchmarkTask {
            id: "complex_success_rate",
            category: "complex",
            prompt_template:
                "Look at the 10 most recent runs of '{flow_name}'. How many of those 10 have finished? Of the finished ones, how many were successful? Report the counts and success rate.",
            skip_reason: need_flow,
        },
        BenchmarkTask {
            id: "complex_compare_runs",
            category: "complex",
            prompt_template:
                "Compare the steps of the 2 most recent finished runs of '{flow_name}'. Show which steps each run has and whether they succeeded.",
            skip_reason: need_flow,
        },
        BenchmarkTask {
            id: "complex_artifact_diff",
            category: "complex",
            prompt_template:
                "Compare the artifacts from the final step of the 2 most recent successful runs of '{flow_name}'. Show what changed.",
            skip_reason: need_flow,
        },
        BenchmarkTask {
            id: "complex_debug_flow",
            category: "complex",
            prompt_template:
                "Investigate '{flow_name}': Get the 10 most recent runs. Report how many have finished, how many of those finished successfully, the success rate among finished runs, and whether any finished run has an error.",
            skip_reason: need_flow,
        },
    ]
}

/// Fill a prompt template from the discovered context.
pub fn render_prompt(task: &BenchmarkTask, ctx: &TestContext) -> String {
    task.prompt_template
        .replace("{flow_name}", &ctx.flow_name)
        .replace("{run}", &ctx.run)
        .replace("{task}", &ctx.task)
        .replace("{step}", &ctx.step)
        .replace("{artifact}", &ctx.artifact)
        .replace("{failed_flow}", &ctx.failed_flow)
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

async fn recent_runs(client: &dyn FlowClient, flow: &str, n: usize) -> Result<Vec<RunInfo>> {
    client.list_runs(flow, n).await
}

/// Ground-truth answer for a task, as a JSON string. Fails only when the
/// backend itself does.
pub async fn reference_answer(
    client: &dyn FlowClient,
    config: &ClientConfig,
    task_id: &str,
    ctx: &TestContext,
) -> Result<String> {
    let value = match task_id {
        "simple_config" => json!({
            "metadata_provider": config.service_url,
            "default_datastore": config.datastore,
        }),

        "simple_list_runs" => {
            let runs = recent_runs(client, &ctx.flow_name, 3).await?;
            Value::Array(
                runs.iter()
                    .map(|r| {
                        json!({
                            "pathspec": r.pathspec,
                            "successful": r.successful(),
                            "finished": r.finished(),
                        })
                    })
                    .collect(),
            )
        }

        "medium_run_details" => {
            let path = RunPath::from_str(&ctx.run)?;
            let run = client.get_run(&path).await?;
            let mut steps = Vec::new();
            for step in client.list_steps(&path).await? {
                let tasks: Vec<Value> = client
                    .list_tasks(&path, &step.name)
                    .await?
                    .iter()
                    .map(|t| json!({"id": t.id, "successful": t.successful()}))
                    .collect();
                steps.push(json!({"step": step.name, "tasks": tasks}));
            }
            json!({
                "pathspec": run.pathspec,
                "successful": run.successful(),
                "steps": steps,
            })
        }

        "medium_task_logs" => {
            let path = TaskPath::from_str(&ctx.task)?;
            let logs = client.get_task_logs(&path).await?;
            json!({
                "pathspec": ctx.task,
                "stdout": truncate_chars(&logs.stdout, 500),
                "stderr": truncate_chars(&logs.stderr, 500),
            })
        }

        "medium_artifact_inspect" => {
            let path = TaskPath::from_str(&ctx.task)?;
            let artifact = client.get_artifact(&path, &ctx.artifact).await?;
            let listed: Vec<Value> = client
                .list_artifacts(&path)
                .await?
                .iter()
                .map(|a| json!({"name": a.name}))
                .collect();
            json!({
                "artifacts": listed,
                "artifact_value": truncate_chars(&artifact.value.to_string(), 500),
            })
        }

        "complex_latest_failure" => {
            let runs = recent_runs(client, &ctx.failed_flow, 20).await?;
            latest_failure_reference(client, &runs).await?
        }

        "complex_success_rate" => {
            let runs = recent_runs(client, &ctx.flow_name, 10).await?;
            let finished = runs.iter().filter(|r| r.finished()).count();
            let successful = runs.iter().filter(|r| r.successful()).count();
            let rate = if finished > 0 {
                successful as f64 / finished as f64
            } else {
                0.0
            };
            json!({
                "flow": ctx.flow_name,
                "total_runs": runs.len(),
                "total_finished": finished,
                "successful": successful,
                "success_rate": round2(rate),
            })
        }

        "complex_compare_runs" => {
            let runs = recent_runs(client, &ctx.flow_name, 20).await?;
            let finished: Vec<&RunInfo> = runs.iter().filter(|r| r.finished()).take(2).collect();
            if finished.len() < 2 {
                json!({"error": "not enough finished runs to compare"})
            } else {
                let mut comparison = Vec::new();
                for run in finished {
                    let path = RunPath::new(&run.flow, &run.id);
                    let steps: Vec<String> = client
                        .list_steps(&path)
                        .await?
                        .into_iter()
                        .map(|s| s.name)
                        .collect();
                    comparison.push(json!({
                        "pathspec": run.pathspec,
                        "successful": run.successful(),
                        "steps": steps,
                    }));
                }
                Value::Array(comparison)
            }
        }

        "complex_artifact_diff" => {
            let runs = recent_runs(client, &ctx.flow_name, 20).await?;
            let successful: Vec<&RunInfo> =
                runs.iter().filter(|r| r.successful()).take(2).collect();
            if successful.len() < 2 {
                json!({"error": "not enough successful runs"})
            } else {
                let mut results = Vec::new();
                for run in successful {
                    let path = RunPath::new(&run.flow, &run.id);
                    let steps = client.list_steps(&path).await?;
                    let last_step = steps.iter().max_by_key(|s| s.finished_at);
                    if let Some(step) = last_step {
                        if let Some(task) = client.list_tasks(&path, &step.name).await?.first() {
                            let task_path = path.task(&step.name, &task.id);
                            let mut arts = serde_json::Map::new();
                            for info in client.list_artifacts(&task_path).await? {
                                if info.name.starts_with('_') {
                                    continue;
                                }
                                let art = client.get_artifact(&task_path, &info.name).await?;
                                arts.insert(
                                    info.name,
                                    json!(truncate_chars(&art.value.to_string(), 200)),
                                );
                            }
                            results.push(json!({
                                "run": run.pathspec,
                                "step": step.name,
                                "artifacts": arts,
                            }));
                        }
                    }
                }
                Value::Array(results)
            }
        }

        "complex_debug_flow" => {
            let runs = recent_runs(client, &ctx.flow_name, 10).await?;
            let finished: Vec<&RunInfo> = runs.iter().filter(|r| r.finished()).collect();
            let successful = finished.iter().filter(|r| r.successful()).count();
            let rate = if finished.is_empty() {
                0.0
            } else {
                successful as f64 / finished.len() as f64
            };
            let failed: Vec<RunInfo> = finished
                .iter()
                .filter(|r| !r.successful())
                .map(|r| (*r).clone())
                .collect();
            let latest_error = first_failing_task(client, &failed).await?;
            json!({
                "flow": ctx.flow_name,
                "total_runs": runs.len(),
                "total_finished": finished.len(),
                "successful": successful,
                "success_rate": round2(rate),
                "latest_error": latest_error,
            })
        }

        other => json!({"error": format!("unknown task '{other}'")}),
    };
    Ok(value.to_string())
}

async fn latest_failure_reference(client: &dyn FlowClient, runs: &[RunInfo]) -> Result<Value> {
    for run in runs.iter().filter(|r| r.finished() && !r.successful()) {
        let path = RunPath::new(&run.flow, &run.id);
        for step in client.list_steps(&path).await? {
            for task in client.list_tasks(&path, &step.name).await? {
                if task.finished() && !task.successful() {
                    return Ok(json!({
                        "run": run.pathspec,
                        "failing_step": step.name,
                        "exception": task.exception,
                    }));
                }
            }
        }
        return Ok(json!({
            "run": run.pathspec,
            "note": "failed but no failing task found",
        }));
    }
    Ok(json!({"message": "no failed runs found"}))
}

/// The newest failing task across the given failed runs, if any.
async fn first_failing_task(client: &dyn FlowClient, failed: &[RunInfo]) -> Result<Value> {
    for run in failed {
        let path = RunPath::new(&run.flow, &run.id);
        for step in client.list_steps(&path).await? {
            for task in client.list_tasks(&path, &step.name).await? {
                if task.finished() && !task.successful() {
                    if let Some(exception) = &task.exception {
                        return Ok(json!({
                            "run": run.pathspec,
                            "step": step.name,
                            "exception": exception,
                        }));
                    }
                }
            }
        }
    }
    Ok(Value::Null)
}

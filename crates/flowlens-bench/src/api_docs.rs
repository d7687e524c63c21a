//! Static API reference over the workflow client surface.
//!
//! The skill approach embeds the rendered reference in its system prompt;
//! the search-then-execute approach exposes keyword search over the same
//! entries as its discovery phase.

/// One documented API member.
#[derive(Debug, Clone, Copy)]
pub struct ApiEntry {
    pub class_name: &'static str,
    pub member_name: &'static str,
    pub kind: &'static str,
    pub signature: &'static str,
    pub docstring: &'static str,
}

pub const API_ENTRIES: &[ApiEntry] = &[
    ApiEntry {
        class_name: "Client",
        member_name: "get_config",
        kind: "tool",
        signature: "get_config()",
        docstring: "Show the backend configuration: metadata provider, active namespace, default datastore, and profile.",
    },
    ApiEntry {
        class_name: "Client",
        member_name: "list_flows",
        kind: "tool",
        signature: "list_flows(last_n=50)",
        docstring: "List available flows, most recently active first.",
    },
    ApiEntry {
        class_name: "Flow",
        member_name: "search_runs",
        kind: "tool",
        signature: "search_runs(flow_name, last_n=5, status=None, created_after=None, created_before=None, tags=None)",
        docstring: "Find recent runs of a flow with optional status, time-window, and tag filters. Runs come back newest first.",
    },
    ApiEntry {
        class_name: "Run",
        member_name: "get_run",
        kind: "tool",
        signature: "get_run(run_id)",
        docstring: "Detailed run status with the per-step, per-task breakdown and durations. run_id is 'FlowName/RunNumber'.",
    },
    ApiEntry {
        class_name: "Run",
        member_name: "successful",
        kind: "property",
        signature: "run.successful",
        docstring: "Whether the run finished in a successful state.",
    },
    ApiEntry {
        class_name: "Run",
        member_name: "finished",
        kind: "property",
        signature: "run.finished",
        docstring: "Whether the run reached a terminal state.",
    },
    ApiEntry {
        class_name: "Task",
        member_name: "get_task_logs",
        kind: "tool",
        signature: "get_task_logs(run_id, step, task, stdout=True, stderr=True, head=None, tail=None, pattern=None)",
        docstring: "Stdout and stderr for a task, with optional head, tail, or regex line filtering.",
    },
    ApiEntry {
        class_name: "Task",
        member_name: "exception",
        kind: "property",
        signature: "task.exception",
        docstring: "Exception repr if the task failed with one, else null.",
    },
    ApiEntry {
        class_name: "Task",
        member_name: "list_artifacts",
        kind: "tool",
        signature: "list_artifacts(run_id, step, task)",
        docstring: "List artifact names and metadata for a task without loading values.",
    },
    ApiEntry {
        class_name: "Task",
        member_name: "get_artifact",
        kind: "tool",
        signature: "get_artifact(run_id, step, task, name)",
        docstring: "Load the value of a named data artifact from a task.",
    },
    ApiEntry {
        class_name: "Flow",
        member_name: "get_latest_failure",
        kind: "tool",
        signature: "get_latest_failure(flow_name, last_n_runs=20)",
        docstring: "Scan recent runs of a flow for failures and return failing step, task, exception, and a stderr tail.",
    },
    ApiEntry {
        class_name: "Flow",
        member_name: "search_artifacts",
        kind: "tool",
        signature: "search_artifacts(flow_name, artifact_name, last_n_runs=5, step_name=None)",
        docstring: "Find which tasks produced a named artifact across recent runs, without loading data.",
    },
];

/// Render all entries as a markdown reference, grouped by class.
pub fn render_reference() -> String {
    let mut lines = vec!["# Workflow Client API Reference".to_string(), String::new()];
    let mut current_class = "";
    for entry in API_ENTRIES {
        if entry.class_name != current_class {
            current_class = entry.class_name;
            lines.push(format!("## {current_class}"));
            lines.push(String::new());
        }
        lines.push(format!("- `{}` -- {}", entry.signature, entry.docstring));
    }
    lines.push(String::new());
    lines.push("## Common Patterns".to_string());
    lines.push("```".to_string());
    lines.push("get_config()                      # which backend, which namespace".to_string());
    lines.push("list_flows()                      # discover flow names".to_string());
    lines.push("search_runs('MyFlow', last_n=10)  # recent runs, newest first".to_string());
    lines.push("get_run('MyFlow/42')              # step/task breakdown".to_string());
    lines.push("get_task_logs('MyFlow/42', 'train', '7', tail=50)".to_string());
    lines.push("get_artifact('MyFlow/42', 'end', '1', 'model')".to_string());
    lines.push("```".to_string());
    lines.join("\n")
}

/// Keyword-overlap search over the entries. Returns formatted matches, best
/// first, at most `top_k`.
pub fn search_api(query: &str, top_k: usize) -> String {
    let query_words: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(usize, &ApiEntry)> = API_ENTRIES
        .iter()
        .filter_map(|entry| {
            let haystack = format!(
                "{} {} {} {}",
                entry.class_name, entry.member_name, entry.kind, entry.docstring
            )
            .to_lowercase();
            let overlap = query_words
                .iter()
                .filter(|w| haystack.split_whitespace().any(|h| h == w.as_str()))
                .count();
            (overlap > 0).then_some((overlap, entry))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    if scored.is_empty() {
        return "No matching API entries found.".to_string();
    }

    let mut lines = Vec::new();
    for (_, entry) in scored.into_iter().take(top_k) {
        lines.push(format!("**{}**: `{}`", entry.kind, entry.signature));
        lines.push(format!("  {}", entry.docstring));
        lines.push(String::new());
    }
    lines.join("\n")
}

//! The four prompting strategies under comparison.
//!
//! Each approach is a fixed system prompt controlling how the agent behind
//! the relay answers: through MCP tools only, through code it discovers or
//! already knows, or with a full API reference provided upfront.

use crate::api_docs;

/// A benchmarked approach. Selected by name; no dynamic dispatch needed
/// since the set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Approach {
    /// Baseline: the agent calls the MCP tools directly, no code.
    McpDirect,
    /// Two-phase code mode: keyword-search the API schema first, then
    /// write code against what was found. No reference in the prompt.
    SearchExecute,
    /// Write code from training knowledge alone.
    CodeMode,
    /// Code mode plus the full embedded API reference.
    Skill,
}

pub const ALL: &[Approach] = &[
    Approach::McpDirect,
    Approach::SearchExecute,
    Approach::CodeMode,
    Approach::Skill,
];

impl Approach {
    pub fn name(&self) -> &'static str {
        match self {
            Approach::McpDirect => "mcp_direct",
            Approach::SearchExecute => "search_execute",
            Approach::CodeMode => "code_mode",
            Approach::Skill => "skill",
        }
    }

    pub fn from_name(name: &str) -> Option<Approach> {
        ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Whether the relay should let the agent execute code. Only the MCP
    /// baseline forbids it.
    pub fn allows_execution(&self) -> bool {
        !matches!(self, Approach::McpDirect)
    }

    pub fn system_prompt(&self) -> String {
        match self {
            Approach::McpDirect => "You are a workflow run assistant. You have access to MCP tools \
                 (get_config, list_flows, search_runs, get_run, get_task_logs, \
                 list_artifacts, get_artifact, get_latest_failure, \
                 search_artifacts). Use ONLY these MCP tools to answer the \
                 user's question. Do NOT write or execute code. Be concise \
                 and factual in your response."
                .to_string(),

            Approach::SearchExecute => "You are a workflow run assistant. You interact with the workflow \
                 API in two phases. Do NOT use any MCP tools directly.\n\n\
                 ## Phase 1: Search (discover the API)\n\
                 Query the API schema by keyword to find relevant functions, \
                 their signatures, and what they return. The full reference is \
                 NOT in your context; discover only what the question needs.\n\n\
                 ## Phase 2: Execute (call the API)\n\
                 Write and run code that calls the discovered functions. All \
                 functions return JSON. Chain multiple calls in one script so \
                 intermediate results stay in your code instead of your \
                 context.\n\n\
                 Print your final answer to stdout. Be concise and factual."
                .to_string(),

            Approach::CodeMode => "You are a workflow run assistant. Answer the user's question by \
                 writing and executing code against the workflow client \
                 library. Do NOT use any MCP tools.\n\n\
                 Key API patterns:\n\
                 search_runs(flow_name, last_n) -- recent runs, newest first\n\
                 get_run(run_id) -- step/task breakdown; run_id is 'Flow/Run'\n\
                 get_task_logs(run_id, step, task) -- stdout/stderr\n\
                 list_artifacts / get_artifact -- task outputs\n\
                 get_latest_failure(flow_name) -- failing step, task, exception\n\n\
                 Print results to stdout. Be concise and factual."
                .to_string(),

            Approach::Skill => format!(
                "You are a workflow run assistant. Answer the user's question by \
                 writing and executing code against the workflow client \
                 library. Do NOT use any MCP tools.\n\n\
                 Here is the complete client API reference:\n\n{}\n\n\
                 Print results to stdout. Be concise and factual.",
                api_docs::render_reference()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_roundtrip() {
        for approach in ALL {
            assert_eq!(Approach::from_name(approach.name()), Some(*approach));
        }
        assert_eq!(Approach::from_name("magic"), None);
    }

    #[test]
    fn test_only_mcp_direct_forbids_execution() {
        assert!(!Approach::McpDirect.allows_execution());
        assert!(Approach::SearchExecute.allows_execution());
        assert!(Approach::CodeMode.allows_execution());
        assert!(Approach::Skill.allows_execution());
    }

    #[test]
    fn test_skill_prompt_embeds_reference() {
        let prompt = Approach::Skill.system_prompt();
        assert!(prompt.contains("API Reference"));
        assert!(prompt.contains("get_latest_failure"));
    }

    #[test]
    fn test_search_execute_prompt_omits_reference() {
        let prompt = Approach::SearchExecute.system_prompt();
        assert!(!prompt.contains("get_latest_failure"));
    }
}

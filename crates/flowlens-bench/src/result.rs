//! The per-combination result record.

use serde::{Deserialize, Serialize};

/// Outcome of one (approach, model, task) combination. Written once by the
/// worker that ran it; the judge later fills in the score fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchResult {
    pub approach: String,
    pub model: String,
    pub task_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub wall_clock_seconds: f64,
    pub final_answer: String,
    pub estimated_cost_usd: f64,
    /// `None` means unscored (judge skipped, or its output was unusable).
    /// Never to be read as an implied zero.
    pub judge_score: Option<f64>,
    pub judge_rationale: String,
    /// Set when the combination itself failed (relay error, timeout).
    pub error: Option<String>,
}

impl BenchResult {
    /// An empty result shell for a combination that has not produced an
    /// answer, with identity fields filled in.
    pub fn empty(approach: &str, model: &str, task_id: &str) -> Self {
        Self {
            approach: approach.to_string(),
            model: model.to_string(),
            task_id: task_id.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            wall_clock_seconds: 0.0,
            final_answer: String::new(),
            estimated_cost_usd: 0.0,
            judge_score: None,
            judge_rationale: String::new(),
            error: None,
        }
    }

    /// The unique (approach, model, task) identity of this result.
    pub fn key(&self) -> (String, String, String) {
        (
            self.approach.clone(),
            self.model.clone(),
            self.task_id.clone(),
        )
    }
}

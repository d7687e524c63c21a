//! LLM-as-judge correctness scoring.
//!
//! Runs after all workers finish, sequentially, through the same relay.
//! Anything the judge returns that is not a clean in-range verdict leaves
//! the result unscored; a missing score is never a passing default.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::JUDGE_MODEL;
use crate::relay::{ModelRelay, RelayRequest};
use crate::result::BenchResult;

const JUDGE_MAX_TOKENS: u32 = 512;

const JUDGE_SYSTEM: &str = "\
You are a strict judge evaluating whether an AI assistant's answer correctly \
addresses a question about workflow run data. You will be given:
1. The original question
2. A reference answer (ground truth from the workflow API)
3. The candidate answer to evaluate

Score the candidate on a 5-level scale:
- 1.0: Fully correct -- all key facts match the reference
- 0.75: Mostly correct -- minor omissions or formatting differences but core facts right
- 0.5: Partially correct -- some key facts right but significant omissions or errors
- 0.25: Mostly wrong -- only trivially correct elements
- 0.0: Completely wrong or no meaningful answer

Focus on factual correctness, not style. The candidate doesn't need to match \
the reference format exactly -- it needs to convey the same key information.

Respond with ONLY a JSON object:
{\"score\": <float>, \"rationale\": \"<brief explanation>\"}
";

#[derive(Deserialize)]
struct RawVerdict {
    score: f64,
    #[serde(default)]
    rationale: String,
}

/// A parsed judge verdict. `score == None` means the judge's output could
/// not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub score: Option<f64>,
    pub rationale: String,
}

/// Strip a surrounding markdown code fence, if present.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (which may carry a language tag) and the
    // closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.rsplit_once("```").map(|(b, _)| b).unwrap_or(body).trim()
}

/// Parse the judge's raw output into a verdict, failing closed to
/// unscored on anything malformed or out of range.
pub fn parse_verdict(raw: &str) -> Verdict {
    let body = strip_fences(raw);
    match serde_json::from_str::<RawVerdict>(body) {
        Ok(v) if (0.0..=1.0).contains(&v.score) && v.score.is_finite() => Verdict {
            score: Some(v.score),
            rationale: v.rationale,
        },
        Ok(v) => Verdict {
            score: None,
            rationale: format!("judge score {} out of range", v.score),
        },
        Err(e) => Verdict {
            score: None,
            rationale: format!("unparseable judge output: {e}"),
        },
    }
}

/// Score one candidate answer against its reference.
pub async fn judge_answer(
    relay: &dyn ModelRelay,
    question: &str,
    reference: &str,
    candidate: &str,
) -> Verdict {
    let prompt = format!(
        "## Question\n{question}\n\n\
         ## Reference Answer (ground truth)\n{reference}\n\n\
         ## Candidate Answer\n{candidate}\n"
    );
    let mut request = RelayRequest::new(JUDGE_MODEL, JUDGE_SYSTEM, &prompt, false);
    request.max_tokens = JUDGE_MAX_TOKENS;

    match relay.complete(request).await {
        Ok(outcome) => parse_verdict(&outcome.text),
        Err(e) => Verdict {
            score: None,
            rationale: format!("judge error: {e}"),
        },
    }
}

/// Fill in judge fields on every result, keyed by task id. Errored
/// combinations have no answer to evaluate; they score a flat zero.
pub async fn evaluate_results(
    relay: &dyn ModelRelay,
    results: &mut [BenchResult],
    questions: &HashMap<String, String>,
    references: &HashMap<String, String>,
) {
    let total = results.len();
    for (i, result) in results.iter_mut().enumerate() {
        if let Some(error) = &result.error {
            result.judge_score = Some(0.0);
            result.judge_rationale = format!("skipped: {error}");
            continue;
        }

        let question = questions.get(&result.task_id).cloned().unwrap_or_default();
        let reference = references.get(&result.task_id).cloned().unwrap_or_default();

        tracing::info!(
            progress = %format!("{}/{total}", i + 1),
            approach = %result.approach,
            model = %result.model,
            task = %result.task_id,
            "judging"
        );

        let verdict = judge_answer(relay, &question, &reference, &result.final_answer).await;
        result.judge_score = verdict.score;
        result.judge_rationale = verdict.rationale;
    }
}

//! Concurrent execution of the benchmark matrix.
//!
//! Workers acquire a semaphore permit, run one combination to completion,
//! and send the finished record over a channel. A single aggregator owns
//! the results vector, so no partially written record is ever visible and
//! nothing is shared mutably across workers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};

use crate::approaches::{Approach, ALL};
use crate::config::{estimate_cost, model_names};
use crate::relay::{ModelRelay, RelayRequest};
use crate::result::BenchResult;

/// One cell of the (approach x model x task) matrix, fully rendered.
#[derive(Debug, Clone)]
pub struct Combination {
    pub approach: Approach,
    pub model: String,
    pub task_id: String,
    pub prompt: String,
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Run a single combination through the relay. Failures are recorded on
/// the result; they never propagate.
pub async fn run_combination(relay: &dyn ModelRelay, combo: &Combination) -> BenchResult {
    let mut result = BenchResult::empty(combo.approach.name(), &combo.model, &combo.task_id);
    let request = RelayRequest::new(
        &combo.model,
        &combo.approach.system_prompt(),
        &combo.prompt,
        combo.approach.allows_execution(),
    );

    let started = Instant::now();
    match relay.complete(request).await {
        Ok(outcome) => {
            result.input_tokens = outcome.input_tokens;
            result.output_tokens = outcome.output_tokens;
            result.total_tokens = outcome.input_tokens + outcome.output_tokens;
            result.final_answer = outcome.text;
        }
        Err(e) => {
            tracing::warn!(
                approach = combo.approach.name(),
                model = %combo.model,
                task = %combo.task_id,
                error = %e,
                "combination failed"
            );
            result.error = Some(e.to_string());
        }
    }
    result.wall_clock_seconds = round_to(started.elapsed().as_secs_f64(), 2);
    result.estimated_cost_usd = round_to(
        estimate_cost(&combo.model, result.input_tokens, result.output_tokens),
        4,
    );
    result
}

/// Execute every combination with at most `concurrency` in flight and
/// return the results in deterministic (approach, model, task) order.
pub async fn run_matrix(
    relay: Arc<dyn ModelRelay>,
    combos: Vec<Combination>,
    concurrency: usize,
) -> Vec<BenchResult> {
    let total = combos.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<BenchResult>(total.max(1));

    for combo in combos {
        let relay = Arc::clone(&relay);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        tokio::spawn(async move {
            // Closing the semaphore is not part of this design; acquire
            // only fails then, so a failure here means shutdown anyway.
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            tracing::info!(
                approach = combo.approach.name(),
                model = %combo.model,
                task = %combo.task_id,
                "running"
            );
            let result = run_combination(relay.as_ref(), &combo).await;
            tracing::info!(
                approach = %result.approach,
                model = %result.model,
                task = %result.task_id,
                tokens = result.total_tokens,
                seconds = result.wall_clock_seconds,
                error = result.error.as_deref().unwrap_or(""),
                "finished"
            );
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    sort_results(&mut results);
    results
}

/// Canonical result order: approach declaration order, then model pricing
/// table order, then task id. Unknown names sort last, alphabetically.
pub fn sort_results(results: &mut [BenchResult]) {
    let approach_rank = |name: &str| {
        ALL.iter()
            .position(|a| a.name() == name)
            .unwrap_or(ALL.len())
    };
    let models = model_names();
    let model_rank = |name: &str| models.iter().position(|m| *m == name).unwrap_or(models.len());
    results.sort_by(|a, b| {
        (approach_rank(&a.approach), &a.approach)
            .cmp(&(approach_rank(&b.approach), &b.approach))
            .then_with(|| {
                (model_rank(&a.model), &a.model).cmp(&(model_rank(&b.model), &b.model))
            })
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
}

/// Build the cross product for the selected approaches, models, and
/// rendered task prompts.
pub fn build_matrix(
    approaches: &[Approach],
    models: &[String],
    prompts: &[(String, String)],
) -> Vec<Combination> {
    let mut combos = Vec::with_capacity(approaches.len() * models.len() * prompts.len());
    for approach in approaches {
        for model in models {
            for (task_id, prompt) in prompts {
                combos.push(Combination {
                    approach: *approach,
                    model: model.clone(),
                    task_id: task_id.clone(),
                    prompt: prompt.clone(),
                });
            }
        }
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayError, RelayOutcome};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic relay: token counts derive from prompt lengths, and
    /// the peak concurrency is observed.
    struct MockRelay {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_task: Option<String>,
    }

    impl MockRelay {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_task: None,
            }
        }

        fn failing_on(task: &str) -> Self {
            Self {
                fail_task: Some(task.to_string()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ModelRelay for MockRelay {
        async fn complete(&self, request: RelayRequest) -> Result<RelayOutcome, RelayError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(fail) = &self.fail_task {
                if request.prompt.contains(fail.as_str()) {
                    return Err(RelayError::Malformed("mock failure".into()));
                }
            }
            Ok(RelayOutcome {
                text: format!("answer for: {}", request.prompt),
                input_tokens: (request.system.len() + request.prompt.len()) as u64,
                output_tokens: request.prompt.len() as u64,
            })
        }
    }

    fn matrix_120() -> Vec<Combination> {
        let models: Vec<String> = vec!["haiku".into(), "sonnet".into(), "opus".into()];
        let prompts: Vec<(String, String)> = (0..10)
            .map(|i| (format!("task_{i:02}"), format!("prompt for task_{i:02}")))
            .collect();
        build_matrix(ALL, &models, &prompts)
    }

    #[tokio::test]
    async fn test_full_matrix_yields_unique_results() {
        let combos = matrix_120();
        assert_eq!(combos.len(), 120);

        let relay = Arc::new(MockRelay::new());
        let results = run_matrix(relay.clone(), combos, 12).await;
        assert_eq!(results.len(), 120);

        let keys: HashSet<_> = results.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), 120);
        assert!(relay.peak.load(Ordering::SeqCst) <= 12);
    }

    #[tokio::test]
    async fn test_repeat_runs_are_deterministic() {
        let relay = Arc::new(MockRelay::new());
        let first = run_matrix(relay.clone(), matrix_120(), 12).await;
        let second = run_matrix(relay, matrix_120(), 5).await;

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.key(), b.key());
            assert_eq!(a.total_tokens, b.total_tokens);
            assert_eq!(a.estimated_cost_usd, b.estimated_cost_usd);
            assert_eq!(a.final_answer, b.final_answer);
        }
    }

    #[tokio::test]
    async fn test_one_failure_never_aborts_the_run() {
        let relay = Arc::new(MockRelay::failing_on("task_03"));
        let results = run_matrix(relay, matrix_120(), 12).await;
        assert_eq!(results.len(), 120);

        let failed: Vec<&BenchResult> =
            results.iter().filter(|r| r.error.is_some()).collect();
        // task_03 fails for every approach and model.
        assert_eq!(failed.len(), 12);
        assert!(failed.iter().all(|r| r.task_id == "task_03"));
        assert!(failed.iter().all(|r| r.total_tokens == 0));
    }

    #[tokio::test]
    async fn test_results_come_back_in_canonical_order() {
        let relay = Arc::new(MockRelay::new());
        let results = run_matrix(relay, matrix_120(), 12).await;
        assert_eq!(results[0].approach, "mcp_direct");
        assert_eq!(results[0].model, "haiku");
        assert_eq!(results[0].task_id, "task_00");
        assert_eq!(results[119].approach, "skill");
        assert_eq!(results[119].model, "opus");
        assert_eq!(results[119].task_id, "task_09");
    }

    #[tokio::test]
    async fn test_cost_accounting_matches_pricing() {
        let relay = MockRelay::new();
        let combo = Combination {
            approach: Approach::McpDirect,
            model: "haiku".into(),
            task_id: "t".into(),
            prompt: "p".repeat(100),
        };
        let result = run_combination(&relay, &combo).await;
        assert_eq!(result.output_tokens, 100);
        let expected = estimate_cost("haiku", result.input_tokens, result.output_tokens);
        assert!((result.estimated_cost_usd - round_to(expected, 4)).abs() < 1e-12);
    }
}

//! Models, pricing, and harness limits.

/// The relay proxies requests to a local agent runtime; no real key needed.
pub const RELAY_API_KEY: &str = "not-needed";

/// Output token cap per relay request.
pub const MAX_TOKENS: u32 = 16384;

/// Model used for correctness scoring.
pub const JUDGE_MODEL: &str = "sonnet";

/// Default size of the worker pool.
pub const DEFAULT_CONCURRENCY: usize = 12;

/// A benchmarked model with its per-million-token pricing in USD.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub name: &'static str,
    pub input_price: f64,
    pub output_price: f64,
}

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "haiku",
        input_price: 1.00,
        output_price: 5.00,
    },
    ModelSpec {
        name: "sonnet",
        input_price: 3.00,
        output_price: 15.00,
    },
    ModelSpec {
        name: "opus",
        input_price: 15.00,
        output_price: 75.00,
    },
];

pub fn model_spec(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.name == name)
}

pub fn model_names() -> Vec<&'static str> {
    MODELS.iter().map(|m| m.name).collect()
}

/// Relay base URL, from `RELAY_BASE_URL` or the local default.
pub fn relay_base_url() -> String {
    std::env::var("RELAY_BASE_URL")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "http://localhost:8082".to_string())
}

/// Estimated cost in USD for a model and token counts. Unknown models
/// cost nothing rather than poisoning the totals.
pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    match model_spec(model) {
        Some(spec) => {
            (input_tokens as f64 * spec.input_price + output_tokens as f64 * spec.output_price)
                / 1_000_000.0
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost_haiku() {
        // 1M input at $1 + 1M output at $5.
        let cost = estimate_cost("haiku", 1_000_000, 1_000_000);
        assert!((cost - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_cost_opus() {
        let cost = estimate_cost("opus", 1000, 2000);
        // 1000 * 15 / 1M + 2000 * 75 / 1M = 0.015 + 0.15
        assert!((cost - 0.165).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_costs_nothing() {
        assert_eq!(estimate_cost("gpt-99", 1_000_000, 1_000_000), 0.0);
    }

    #[test]
    fn test_judge_model_is_benchmarked() {
        assert!(model_spec(JUDGE_MODEL).is_some());
    }
}

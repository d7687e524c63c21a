//! Benchmark harness comparing four ways of giving a model access to
//! workflow run data: direct MCP tool use, two flavors of code mode, and a
//! skill prompt carrying a full API reference.
//!
//! The harness runs the (approach x model x task) cross product through a
//! relay, scores answers with an LLM judge against reference answers
//! computed from the live backend, and reports per-combination and
//! aggregate tables.

pub mod api_docs;
pub mod approaches;
pub mod config;
pub mod discover;
pub mod driver;
pub mod judge;
pub mod relay;
pub mod report;
pub mod result;
pub mod tasks;

pub use approaches::Approach;
pub use config::{estimate_cost, ModelSpec, JUDGE_MODEL, MAX_TOKENS, MODELS};
pub use discover::TestContext;
pub use relay::{HttpRelay, ModelRelay, RelayError, RelayOutcome, RelayRequest};
pub use result::BenchResult;
pub use tasks::BenchmarkTask;

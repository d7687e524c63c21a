//! Benchmark CLI: discover test data, run the matrix, judge, report.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowlens_bench::approaches::{Approach, ALL};
use flowlens_bench::config::{self, DEFAULT_CONCURRENCY};
use flowlens_bench::discover::{build_test_context, discover_flows};
use flowlens_bench::driver::{build_matrix, run_matrix};
use flowlens_bench::relay::HttpRelay;
use flowlens_bench::tasks::{build_tasks, reference_answer, render_prompt};
use flowlens_bench::{judge, report};
use flowlens_client::{ClientConfig, ServiceClient};

#[derive(Parser, Debug)]
#[command(
    name = "flowlens-bench",
    about = "Benchmark MCP tool use against code-mode approaches"
)]
struct Args {
    /// Approaches to benchmark (default: all).
    #[arg(long, num_args = 1..)]
    approaches: Vec<String>,

    /// Models to benchmark (default: all).
    #[arg(long, num_args = 1..)]
    models: Vec<String>,

    /// Task ids to run (default: all discoverable tasks).
    #[arg(long, num_args = 1..)]
    tasks: Vec<String>,

    /// Output JSON path.
    #[arg(long, default_value = "bench-results.json")]
    output: PathBuf,

    /// Max combinations in flight at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Metadata service base URL.
    #[arg(long, env = "FLOWLENS_SERVICE_URL")]
    service_url: Option<String>,

    /// Skip LLM-as-judge correctness evaluation.
    #[arg(long)]
    skip_judge: bool,

    /// Print detailed progress.
    #[arg(long)]
    verbose: bool,
}

fn select_approaches(names: &[String]) -> Result<Vec<Approach>> {
    if names.is_empty() {
        return Ok(ALL.to_vec());
    }
    names
        .iter()
        .map(|n| {
            Approach::from_name(n)
                .ok_or_else(|| anyhow::anyhow!("unknown approach '{n}'"))
        })
        .collect()
}

fn select_models(names: &[String]) -> Result<Vec<String>> {
    if names.is_empty() {
        return Ok(config::model_names().iter().map(|s| s.to_string()).collect());
    }
    for name in names {
        if config::model_spec(name).is_none() {
            bail!("unknown model '{name}'");
        }
    }
    Ok(names.to_vec())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        "flowlens_bench=debug,flowlens_client=debug"
    } else {
        "flowlens_bench=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let approaches = select_approaches(&args.approaches)?;
    let models = select_models(&args.models)?;

    let relay_url = config::relay_base_url();
    println!("Relay: {relay_url}");

    let mut client_config = ClientConfig::from_env().global();
    if let Some(url) = args.service_url {
        client_config.service_url = url;
    }
    let client = ServiceClient::new(client_config.clone())?;

    // Phase 1: discover test data from the live backend.
    println!("\nPhase 1: Discovering flows...");
    let probes = discover_flows(&client).await?;
    if probes.is_empty() {
        bail!("no flows with enough runs found in the backend; cannot benchmark");
    }
    let names: Vec<&str> = probes.iter().map(|p| p.name.as_str()).collect();
    println!("  Found {} flows: {names:?}", probes.len());

    let ctx = build_test_context(&client, &probes).await?;
    println!("  Primary flow: {}", ctx.flow_name);
    println!("  Run: {}", ctx.run);
    println!("  Task: {}", ctx.task);
    println!("  Artifact: {}", ctx.artifact);
    println!("  Failed flow: {}", ctx.failed_flow);

    // Phase 2: build the task suite and reference answers.
    println!("\nPhase 2: Building tasks...");
    let mut suite = build_tasks(&ctx);
    if !args.tasks.is_empty() {
        suite.retain(|t| args.tasks.iter().any(|id| id == t.id));
    }
    for task in suite.iter().filter(|t| !t.runnable()) {
        println!("  SKIP {}: {}", task.id, task.skip_reason.unwrap_or(""));
    }
    let runnable: Vec<_> = suite.iter().filter(|t| t.runnable()).collect();
    println!(
        "  {} tasks ready, {} skipped",
        runnable.len(),
        suite.len() - runnable.len()
    );
    if runnable.is_empty() {
        bail!("no runnable tasks; check the backend data");
    }

    let mut questions = HashMap::new();
    let mut references = HashMap::new();
    let mut prompts = Vec::new();
    for task in &runnable {
        let prompt = render_prompt(task, &ctx);
        questions.insert(task.id.to_string(), prompt.clone());
        prompts.push((task.id.to_string(), prompt));
        match reference_answer(&client, &client_config, task.id, &ctx).await {
            Ok(answer) => {
                references.insert(task.id.to_string(), answer);
            }
            Err(e) => {
                println!("  WARNING: reference answer failed for {}: {e}", task.id);
                references.insert(task.id.to_string(), format!("(reference error: {e})"));
            }
        }
    }

    // Phase 3: run the matrix.
    let combos = build_matrix(&approaches, &models, &prompts);
    println!(
        "\nPhase 3: Running benchmarks ({} approaches x {} models x {} tasks = {} combinations, {} in flight)...",
        approaches.len(),
        models.len(),
        prompts.len(),
        combos.len(),
        args.concurrency
    );
    let relay = Arc::new(HttpRelay::new(relay_url)?);
    let mut results = run_matrix(relay.clone(), combos, args.concurrency).await;

    // Phase 4: judge.
    if args.skip_judge {
        println!("\nPhase 4: Judging skipped (--skip-judge)");
    } else {
        println!("\nPhase 4: Judging {} results...", results.len());
        judge::evaluate_results(relay.as_ref(), &mut results, &questions, &references).await;
    }

    // Phase 5: report.
    report::save_results(&results, &args.output)?;
    println!("\nResults saved to {}", args.output.display());
    println!("\nDETAILED RESULTS\n{}", report::detail_table(&results));
    println!("AGGREGATE RESULTS\n{}", report::aggregate_table(&results));

    Ok(())
}

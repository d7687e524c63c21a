//! MCP server binary: stdio transport, logs to stderr.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use flowlens_client::{ClientConfig, ServiceClient};
use flowlens_mcp::FlowTools;

#[derive(Parser, Debug)]
#[command(name = "flowlens-mcp", about = "MCP server for workflow run inspection")]
struct Args {
    /// Metadata service base URL.
    #[arg(long, env = "FLOWLENS_SERVICE_URL")]
    service_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the protocol; everything diagnostic goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowlens_mcp=info,flowlens_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Global namespace: scheduler-triggered production runs must be visible.
    let mut config = ClientConfig::from_env().global();
    if let Some(url) = args.service_url {
        config.service_url = url;
    }

    tracing::info!(service_url = %config.service_url, "starting MCP server on stdio");

    let client = ServiceClient::new(config.clone())?;
    let tools = FlowTools::new(Arc::new(client), config);

    let service = tools.serve((stdin(), stdout())).await?;
    service.waiting().await?;

    Ok(())
}

//! Inventory Replay - Standalone Binary
//!
//! Runs a discovery pass against recorded API responses and prints the
//! canonical resource set plus the run summary as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inventory_engine::config::parse_regions;
use inventory_engine::inventory::FixtureClientProvider;
use inventory_engine::{DiscoveryConfig, DiscoveryOrchestrator, ServiceRegistry};

/// Inventory Replay - discover resources from recorded API responses
#[derive(Parser, Debug)]
#[command(name = "inventory-replay", version, about)]
struct Args {
    /// JSON file of recorded service responses
    #[arg(long, env = "INVENTORY_FIXTURES")]
    fixtures: String,

    /// Service to discover (repeatable); defaults to every recorded service
    #[arg(long = "service")]
    services: Vec<String>,

    /// Comma-separated regions (e.g., "us-east-1,eu-west-1")
    #[arg(long)]
    regions: Option<String>,

    /// Maximum services discovered at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-operation timeout in seconds
    #[arg(long)]
    operation_timeout_secs: Option<u64>,

    /// Whole-run timeout in seconds
    #[arg(long)]
    batch_timeout_secs: Option<u64>,

    /// Print the summary only
    #[arg(long, default_value = "false")]
    summary_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let provider = FixtureClientProvider::from_file(&args.fixtures)
        .with_context(|| format!("Failed to load fixtures from {}", args.fixtures))?;
    let registry = ServiceRegistry::builtin().context("Failed to load service patterns")?;

    let services = if args.services.is_empty() {
        provider.service_names()
    } else {
        args.services.clone()
    };
    if services.is_empty() {
        warn!(fixtures = %args.fixtures, "No services to discover");
    }

    info!(
        fixtures = %args.fixtures,
        services = ?services,
        regions = ?config.regions,
        concurrency = config.concurrency,
        "Starting inventory replay"
    );

    let orchestrator = DiscoveryOrchestrator::new(Arc::new(provider), Arc::new(registry), config);
    let run = orchestrator.discover_all(&services).await;

    let output = if args.summary_only {
        serde_json::to_string_pretty(&run.summary)
    } else {
        serde_json::to_string_pretty(&run)
    }
    .context("Failed to serialize discovery run")?;

    println!("{}", output);
    Ok(())
}

/// Environment defaults, overridden by explicit flags
fn build_config(args: &Args) -> Result<DiscoveryConfig> {
    let mut config = DiscoveryConfig::from_env()?;

    if let Some(regions) = &args.regions {
        config = config.with_regions(parse_regions(regions));
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(secs) = args.operation_timeout_secs {
        config = config.with_operation_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.batch_timeout_secs {
        config = config.with_batch_timeout(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}

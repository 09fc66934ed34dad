use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bike_rebalancer::catalog::Catalog;
use bike_rebalancer::config::{OracleConfig, OsrmConfig, PlannerConfig};
use bike_rebalancer::haversine::HaversineMatrix;
use bike_rebalancer::oracle::HttpOracle;
use bike_rebalancer::orchestrator::Orchestrator;
use bike_rebalancer::osrm::OsrmClient;
use bike_rebalancer::tools::register_builtins;
use bike_rebalancer::traits::{DistanceMatrixProvider, FallbackMatrix, JsonFileFeed, StationFeed};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "rebalance")]
#[command(about = "Plan a bike-rebalancing route for one truck", long_about = None)]
struct Cli {
    /// Task JSON (start position and any constraints for the planner).
    #[arg(long)]
    task: PathBuf,

    /// JSON array of station observations.
    #[arg(long)]
    stations: PathBuf,

    /// Planner settings as JSON; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Route distances through OSRM (OSRM_BASE_URL), falling back to straight lines.
    #[arg(long)]
    osrm: bool,

    #[arg(long)]
    max_steps: Option<usize>,

    #[arg(long)]
    max_revisions: Option<usize>,

    #[arg(long)]
    low_threshold: Option<i64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bike_rebalancer=info,rebalance=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlannerConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid planner config {}", path.display()))?,
        None => PlannerConfig::default(),
    };
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(max_revisions) = cli.max_revisions {
        config.max_revisions = max_revisions;
    }
    if let Some(low_threshold) = cli.low_threshold {
        config.low_threshold = low_threshold;
    }

    let task: Value = serde_json::from_str(&read(&cli.task)?)
        .with_context(|| format!("invalid task {}", cli.task.display()))?;
    let feed = JsonFileFeed::new(&cli.stations);
    let observations = feed
        .observations()
        .with_context(|| format!("invalid station observations {}", cli.stations.display()))?;
    tracing::info!(observations = observations.len(), "loaded station feed");

    let matrix: Arc<dyn DistanceMatrixProvider> = if cli.osrm {
        let osrm = OsrmClient::new(OsrmConfig::from_env()).context("failed to build OSRM client")?;
        Arc::new(FallbackMatrix::new(osrm, HaversineMatrix::default()))
    } else {
        Arc::new(HaversineMatrix::default())
    };

    let mut catalog = Catalog::new();
    register_builtins(
        &mut catalog,
        Arc::new(feed),
        Arc::clone(&matrix),
    )?;

    let oracle = HttpOracle::new(OracleConfig::from_env()).context("failed to build oracle client")?;
    let orchestrator = Orchestrator::new(oracle, Arc::new(catalog), config).with_matrix(matrix);

    let outcome = orchestrator.run(task)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

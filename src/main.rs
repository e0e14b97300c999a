//! Fleet Dispatch - real-time delivery assignment
//!
//! Layer 1 assigns each order as it arrives; Layer 2 periodically
//! re-optimizes the whole fleet in the background.

mod cli;
mod config;
mod defaults;
mod error;
mod services;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::Config;
use services::matrix::{build_matrix_file, HaversineEstimator, PlanningData, TravelTimeCache};
use services::simulation::Simulation;
use services::vrp::PragmaticSolver;
use types::Location;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "dispatch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,fleet_dispatch=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    info!("Configuration loaded");

    let command = cli.command.unwrap_or(Command::Simulate { matrix: None, seed: None });
    let result = match command {
        Command::Simulate { matrix, seed } => {
            if let Some(matrix) = matrix {
                config.matrix_file = matrix;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            simulate(config).await
        }
        Command::BuildMatrix { locations, output, cache } => {
            let cache = cache.unwrap_or_else(|| config.cache_file.clone());
            build_matrix(&locations, &output, cache)
        }
    };

    if let Err(e) = &result {
        error!("Fatal: {:#}", e);
    }
    result
}

async fn simulate(config: Config) -> Result<()> {
    info!("Starting Fleet Dispatch simulation...");
    let data = PlanningData::load(&config.matrix_file)
        .context("Run `fleet-dispatch build-matrix` first to produce the matrix file")?;

    let report = Simulation::new(data, config, Arc::new(PragmaticSolver)).run().await?;
    info!(
        assigned = report.orders_assigned,
        placed = report.orders_placed,
        fleet_cost = report.fleet_cost,
        "Simulation finished"
    );

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize simulation report")?;
    println!("{}", json);
    Ok(())
}

fn build_matrix(locations_path: &Path, output: &Path, cache_path: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(locations_path)
        .with_context(|| format!("Failed to read locations '{}'", locations_path.display()))?;
    let locations: Vec<Location> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse locations '{}'", locations_path.display()))?;

    let mut cache = TravelTimeCache::load(cache_path)?;
    let file = build_matrix_file(locations, &mut cache, &HaversineEstimator::default())?;

    let json = serde_json::to_string_pretty(&file).context("Failed to serialize matrix file")?;
    std::fs::write(output, json).with_context(|| format!("Failed to write matrix '{}'", output.display()))?;
    cache.flush()?;

    info!(
        locations = file.locations.len(),
        "Wrote travel-time matrix to {}",
        output.display()
    );
    Ok(())
}

//! CLI argument parsing for the fleet-dispatch binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleet-dispatch", about = "Real-time delivery dispatch with background re-optimization")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Simulate a service day (default if no subcommand given)
    Simulate {
        /// Matrix file, overrides DISPATCH_MATRIX_FILE
        #[arg(long)]
        matrix: Option<PathBuf>,
        /// Seed for the order stream, overrides SIM_SEED
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Build a travel-time matrix file from a JSON list of locations
    BuildMatrix {
        /// Locations JSON, depot first
        #[arg(long)]
        locations: PathBuf,
        /// Where to write the matrix file
        #[arg(long)]
        output: PathBuf,
        /// Travel-time cache, overrides DISPATCH_CACHE_FILE
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

//! Racewatch CLI library — exposed for integration tests

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "racewatch")]
#[command(about = "Static detection of data races and shared-state hazards", long_about = None)]
#[command(version = racewatch_core::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Only show races at or above this severity: low, medium, high, critical
    #[arg(long, global = true)]
    pub min_severity: Option<String>,

    /// Restrict output to races touching this module
    #[arg(long, global = true)]
    pub module: Option<String>,

    /// Restrict output to races touching this file
    #[arg(long, global = true)]
    pub file: Option<String>,

    /// Severity threshold for non-zero exit: low, medium, high, critical, never
    #[arg(long, global = true)]
    pub fail_on: Option<String>,

    /// Path to a .racewatch.toml (default: next to the project document)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .racewatch.toml configuration
    Init {
        /// Path to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Analyze an extracted project document for races
    Analyze {
        /// Path to the project JSON document
        project: PathBuf,
    },

    /// Explain a specific race in detail
    Explain {
        /// Race ID to explain
        race_id: String,

        /// Path to the project JSON document
        project: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

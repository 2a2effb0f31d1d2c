//! Racewatch CLI - static race detection over extracted project documents

use anyhow::Result;
use clap::Parser;
use racewatch_cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let exit_code = match &cli.command {
        Commands::Init { path } => {
            commands::init::run(path.as_deref())?;
            0
        }
        Commands::Analyze { project } => commands::analyze::run(project, &cli)?,
        Commands::Explain { race_id, project } => commands::explain::run(race_id, project, &cli)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

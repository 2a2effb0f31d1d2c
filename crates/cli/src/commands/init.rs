//! Initialize .racewatch.toml configuration

use anyhow::Result;
use racewatch_core::RacewatchConfig;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let target_path = path.unwrap_or_else(|| Path::new("."));
    let config_path = target_path.join(".racewatch.toml");

    if config_path.exists() {
        println!("⚠️  .racewatch.toml already exists at {:?}", config_path);
        return Ok(());
    }

    let config = RacewatchConfig::default();
    config.save(&config_path)?;

    println!("✅ Created .racewatch.toml at {:?}", config_path);
    println!("\nYou can now tune the scoring policy and run:");
    println!("  racewatch analyze project.json");

    Ok(())
}

//! Explain a specific race: score breakdown and both access sites

use anyhow::{Context, Result};
use racewatch_core::{explain_race, Project, RaceDetector, RacewatchConfig};
use std::path::Path;

pub fn run(race_id: &str, project_path: &Path, cli: &crate::Cli) -> Result<i32> {
    let config = if let Some(ref path) = cli.config {
        RacewatchConfig::from_file(path)?
    } else {
        let dir = project_path.parent().unwrap_or_else(|| Path::new("."));
        RacewatchConfig::load_or_default(dir)?
    };

    let project = Project::from_json_file(project_path)
        .with_context(|| format!("Failed to load project document: {}", project_path.display()))?;

    let analysis = RaceDetector::with_config(config).analyze(&project);

    match analysis.race(race_id) {
        Some(race) => {
            print!("{}", explain_race(race));
            Ok(0)
        }
        None => {
            eprintln!("No race with id '{race_id}' ({} detected)", analysis.len());
            Ok(1)
        }
    }
}

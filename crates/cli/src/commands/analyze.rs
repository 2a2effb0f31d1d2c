//! Main analyze command — loads the project document and runs the detector

use anyhow::{bail, Context, Result};
use colored::Colorize;
use racewatch_core::{
    AnalysisSummary, Project, Race, RaceAnalysis, RaceDetector, RacewatchConfig, Severity,
};
use std::path::Path;
use std::time::Instant;

use crate::output;

pub fn run(project_path: &Path, cli: &crate::Cli) -> Result<i32> {
    let start = Instant::now();
    let format = resolve_format(cli);

    if matches!(format, Format::Terminal) {
        println!(
            "{}",
            format!(
                "  racewatch v{} — analyzing project",
                racewatch_core::VERSION
            )
            .bold()
        );
        println!();
    }

    // ── 1. Config ────────────────────────────────────────────────
    let config = load_config(project_path, cli)?;

    // ── 2. Project document ──────────────────────────────────────
    let project = Project::from_json_file(project_path)
        .with_context(|| format!("Failed to load project document: {}", project_path.display()))?;
    let atom_count = project.atom_count();

    // ── 3. Detection ─────────────────────────────────────────────
    let detector = RaceDetector::with_config(config);
    let analysis = detector.analyze(&project);

    // ── 4. Filter & output ───────────────────────────────────────
    let races = select_races(&analysis, cli)?;
    let summary = build_summary(&races);

    match format {
        Format::Json => print_json(&races, &summary),
        Format::Terminal => print_terminal(&races, &summary, atom_count, start),
    }

    // ── 5. Exit code ─────────────────────────────────────────────
    let fail_on = cli.fail_on.as_deref().unwrap_or("never");
    if exceeds_threshold(&races, fail_on) {
        return Ok(1);
    }
    Ok(0)
}

// ── Helpers ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Format {
    Terminal,
    Json,
}

fn resolve_format(cli: &crate::Cli) -> Format {
    match cli.format {
        Some(crate::OutputFormat::Json) => Format::Json,
        _ => Format::Terminal,
    }
}

fn load_config(project_path: &Path, cli: &crate::Cli) -> Result<RacewatchConfig> {
    if let Some(ref path) = cli.config {
        return RacewatchConfig::from_file(path);
    }
    let dir = project_path.parent().unwrap_or_else(|| Path::new("."));
    RacewatchConfig::load_or_default(dir)
}

fn select_races<'a>(analysis: &'a RaceAnalysis, cli: &crate::Cli) -> Result<Vec<&'a Race>> {
    let mut races: Vec<&Race> = if let Some(ref module) = cli.module {
        analysis.races_by_module(module)
    } else {
        analysis.races().iter().collect()
    };

    if let Some(ref file) = cli.file {
        races.retain(|r| r.accesses.iter().any(|a| &a.file == file));
    }

    if let Some(ref name) = cli.min_severity {
        let Some(min) = Severity::from_name(name) else {
            bail!("unknown severity '{name}' (expected low, medium, high, or critical)");
        };
        races.retain(|r| r.severity >= min);
    }

    Ok(races)
}

fn build_summary(races: &[&Race]) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        total_races: races.len(),
        ..Default::default()
    };
    for race in races {
        *summary
            .by_severity
            .entry(race.severity.to_string())
            .or_default() += 1;
        *summary.by_type.entry(race.race_type.clone()).or_default() += 1;
    }
    summary
}

/// Check whether the shown races meet the configured exit threshold.
///
/// - a severity name → fail if any race at or above it
/// - `"never"` → always pass
/// - unknown values fall back to `"critical"`
fn exceeds_threshold(races: &[&Race], fail_on: &str) -> bool {
    if fail_on == "never" {
        return false;
    }
    let min = Severity::from_name(fail_on).unwrap_or(Severity::Critical);
    races.iter().any(|r| r.severity >= min)
}

fn print_terminal(races: &[&Race], summary: &AnalysisSummary, atom_count: usize, start: Instant) {
    for race in races {
        println!("{}", output::terminal::format_race(race));
    }

    if !races.is_empty() {
        println!();
    }

    let count = |name: &str| summary.by_severity.get(name).copied().unwrap_or(0);
    println!("  {}", "\u{2500}".repeat(60).dimmed());
    println!(
        "  {} \u{00b7} {} \u{00b7} {} \u{00b7} {}",
        format!("{} critical", count("critical")).red(),
        format!("{} high", count("high")).yellow(),
        format!("{} medium", count("medium")).blue(),
        format!("{} low", count("low")).dimmed()
    );
    println!("  {} atoms analyzed \u{00b7} {} race(s)", atom_count, summary.total_races);
    println!("  Time: {:.1}s", start.elapsed().as_secs_f64());
}

fn print_json(races: &[&Race], summary: &AnalysisSummary) {
    let out = output::json::JsonOutput {
        races: races.iter().map(|r| (*r).clone()).collect(),
        summary: summary.clone(),
    };

    match serde_json::to_string_pretty(&out) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize JSON: {}", e),
    }
}

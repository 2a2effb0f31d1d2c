//! Terminal output formatting

use racewatch_core::{Race, Severity};

pub fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "❌",
        Severity::High => "⚠️ ",
        Severity::Medium => "ℹ️ ",
        Severity::Low => "  ",
    }
}

/// Render one race as a terminal listing block
pub fn format_race(race: &Race) -> String {
    let [a, b] = &race.accesses;

    let mitigation = if race.mitigation.has_mitigation {
        format!("{} ({})", race.mitigation.kind, race.mitigation.confidence)
    } else {
        "none".to_string()
    };
    let timing = if race.timing.can_run_concurrently {
        "concurrent"
    } else {
        "sequential"
    };

    format!(
        "  {} {} [{}] {} on `{}`\n      {} in `{}` ({}:{})\n      {} in `{}` ({}:{})\n      mitigation: {} \u{00b7} timing: {} ({}) \u{00b7} score {:.1}/10",
        severity_icon(race.severity),
        race.id,
        race.severity,
        race.race_type,
        race.state_key,
        a.access_type,
        a.atom_id,
        a.file,
        a.line,
        b.access_type,
        b.atom_id,
        b.file,
        b.line,
        mitigation,
        timing,
        race.timing.confidence,
        race.risk_score.value,
    )
}

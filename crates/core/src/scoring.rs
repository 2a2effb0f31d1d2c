//! Risk scorer — weighted, bounded, explainable
//!
//! The score is a sum of independently bounded factors (race type, async
//! context, data integrity, scope, frequency) minus the mitigation and timing
//! adjustments, clamped to [0, 10] and bucketed into severities. Every factor
//! lands in the breakdown so a reviewer can see exactly why a race scored the
//! way it did. The numbers are policy from [`ScoringConfig`]; only the
//! relative orderings are guaranteed.

use crate::config::{ScoringConfig, ThresholdConfig};
use crate::race::{Confidence, Race, RiskScore, ScoreFactor, Severity, StateCategory};

/// Per-race context the orchestrator precomputes from the project
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreContext {
    /// Distinct business flows either access participates in
    pub flow_count: usize,

    /// Distinct entry points from which either access is reachable
    pub entry_point_count: usize,

    /// Distinct atoms touching the same state key beyond the pair itself
    pub extra_atom_count: usize,
}

/// Score one race. Pure; the caller attaches the result to the race.
pub fn score_race(
    race: &Race,
    ctx: &ScoreContext,
    scoring: &ScoringConfig,
    thresholds: &ThresholdConfig,
) -> RiskScore {
    let mut breakdown = Vec::new();
    let push = |breakdown: &mut Vec<ScoreFactor>, factor: &str, contribution: f64| {
        breakdown.push(ScoreFactor {
            factor: factor.to_string(),
            contribution,
        });
        contribution
    };

    let mut total = 0.0;

    total += push(&mut breakdown, "race-type", type_weight(race.severity, scoring));

    let async_w = if race.accesses.iter().any(|a| a.is_async) {
        scoring.async_weight
    } else {
        0.0
    };
    total += push(&mut breakdown, "async", async_w);

    let integrity = category_base(race.state_type, scoring) * type_multiplier(&race.race_type, scoring);
    total += push(&mut breakdown, "data-integrity", integrity);

    let scope = (ctx.flow_count as f64 * scoring.scope_per_flow
        + ctx.entry_point_count as f64 * scoring.scope_per_entry_point)
        .min(scoring.scope_cap);
    total += push(&mut breakdown, "scope", scope);

    let frequency =
        (ctx.extra_atom_count as f64 * scoring.frequency_per_atom).min(scoring.frequency_cap);
    total += push(&mut breakdown, "frequency", frequency);

    let mitigation_adj = if race.mitigation.has_mitigation {
        let penalty = match race.mitigation.confidence {
            Confidence::High => scoring.mitigation_penalty_high,
            Confidence::Medium => scoring.mitigation_penalty_medium,
            Confidence::Low => scoring.mitigation_penalty_low,
        };
        -penalty
    } else {
        0.0
    };
    total += push(&mut breakdown, "mitigation", mitigation_adj);

    let timing_adj = if race.timing.can_run_concurrently {
        0.0
    } else {
        -scoring.sequential_reduction
    };
    total += push(&mut breakdown, "timing", timing_adj);

    let value = total.clamp(0.0, 10.0);
    let mut severity = bucket(value, thresholds);

    // A high-confidence mitigation never scores above medium, whatever the
    // other factors say
    if race.mitigation.has_mitigation
        && race.mitigation.confidence == Confidence::High
        && severity > Severity::Medium
    {
        severity = Severity::Medium;
    }

    RiskScore {
        value,
        breakdown,
        severity,
        testing_recommendation: recommendation(severity, &race.race_type),
    }
}

/// Map a clamped score onto the documented severity buckets
pub fn bucket(value: f64, thresholds: &ThresholdConfig) -> Severity {
    if value < thresholds.medium {
        Severity::Low
    } else if value < thresholds.high {
        Severity::Medium
    } else if value < thresholds.critical {
        Severity::High
    } else {
        Severity::Critical
    }
}

fn type_weight(severity: Severity, scoring: &ScoringConfig) -> f64 {
    match severity {
        Severity::Low => scoring.type_weight_low,
        Severity::Medium => scoring.type_weight_medium,
        Severity::High => scoring.type_weight_high,
        Severity::Critical => scoring.type_weight_critical,
    }
}

fn category_base(category: StateCategory, scoring: &ScoringConfig) -> f64 {
    match category {
        StateCategory::Global => scoring.category_global,
        StateCategory::Database => scoring.category_database,
        StateCategory::ModuleScope => scoring.category_module_scope,
        StateCategory::Cache => scoring.category_cache,
        StateCategory::Queue => scoring.category_queue,
        StateCategory::Filesystem => scoring.category_filesystem,
    }
}

/// Double writes corrupt state harder than read skews, so the write-write
/// family multiplies highest, then competing initialization
fn type_multiplier(race_type: &str, scoring: &ScoringConfig) -> f64 {
    match race_type {
        "write-write" | "counter-increment" | "array-mutation" | "file-write" => {
            scoring.multiplier_write_write
        }
        "init-race" => scoring.multiplier_init_race,
        _ => scoring.multiplier_default,
    }
}

/// Map final severity and race type onto testing guidance
fn recommendation(severity: Severity, race_type: &str) -> String {
    let base = match severity {
        Severity::Critical => {
            "add a concurrency/integration test driving both access paths simultaneously before shipping"
        }
        Severity::High => "add a concurrency/integration test covering both access sites",
        Severity::Medium => "cover the shared state with a unit test and review interleavings manually",
        Severity::Low => "manual review sufficient",
    };

    let hint = match race_type {
        "init-race" => Some("exercise first-use initialization from multiple entry points at once"),
        "counter-increment" => Some("assert the final count after N parallel increments"),
        "database-update" => Some("run overlapping transactions against the same rows"),
        "cache-race" => Some("interleave a cache miss-and-fill with an invalidation"),
        "event-handler-conflict" => Some("verify handler registration order does not change behavior"),
        _ => None,
    };

    match hint {
        Some(h) => format!("{base}; {h}"),
        None => base.to_string(),
    }
}

/// Render a human-readable account of a scored race: both access sites, the
/// verdicts, and the per-factor breakdown.
pub fn explain_race(race: &Race) -> String {
    let [a, b] = &race.accesses;
    let mut out = String::new();

    out.push_str(&format!(
        "{} [{}] {} on `{}`\n",
        race.id, race.risk_score.severity, race.race_type, race.state_key
    ));
    out.push_str(&format!(
        "  {} in `{}` ({}:{})\n",
        a.access_type, a.atom_id, a.file, a.line
    ));
    out.push_str(&format!(
        "  {} in `{}` ({}:{})\n",
        b.access_type, b.atom_id, b.file, b.line
    ));

    if race.mitigation.has_mitigation {
        out.push_str(&format!(
            "  mitigation: {} ({}) — {}\n",
            race.mitigation.kind, race.mitigation.confidence, race.mitigation.details
        ));
    } else {
        out.push_str("  mitigation: none\n");
    }

    let timing = if race.timing.can_run_concurrently {
        "concurrent"
    } else {
        "sequential"
    };
    out.push_str(&format!(
        "  timing: {} ({}) — {}\n",
        timing, race.timing.confidence, race.timing.details
    ));

    out.push_str(&format!("  score: {:.1}/10\n", race.risk_score.value));
    for factor in &race.risk_score.breakdown {
        out.push_str(&format!(
            "    {:<16} {:+.2}\n",
            factor.factor, factor.contribution
        ));
    }
    out.push_str(&format!(
        "  testing: {}\n",
        race.risk_score.testing_recommendation
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScoringConfig, ThresholdConfig};
    use crate::race::{
        AccessKind, Mitigation, MitigationKind, SharedStateAccess, TimingVerdict,
    };

    fn access(atom: &str, kind: AccessKind, is_async: bool) -> SharedStateAccess {
        SharedStateAccess {
            atom_id: atom.to_string(),
            file: "a.js".to_string(),
            state_key: "module:app#counter".to_string(),
            access_type: kind,
            code: "counter++;".to_string(),
            line: 1,
            is_async,
            is_lazy: false,
        }
    }

    fn race(state_key: &str, severity: Severity) -> Race {
        Race {
            id: "RACE-000000000000".to_string(),
            race_type: "write-write".to_string(),
            state_key: state_key.to_string(),
            state_type: StateCategory::from_state_key(state_key),
            severity,
            accesses: [
                access("a.js:f", AccessKind::Write, false),
                access("b.js:g", AccessKind::Write, false),
            ],
            mitigation: Mitigation::default(),
            timing: TimingVerdict::default(),
            risk_score: RiskScore::default(),
            description: String::new(),
        }
    }

    #[test]
    fn test_bucket_thresholds() {
        let t = ThresholdConfig::default();
        assert_eq!(bucket(0.0, &t), Severity::Low);
        assert_eq!(bucket(3.0, &t), Severity::Medium);
        assert_eq!(bucket(6.0, &t), Severity::High);
        assert_eq!(bucket(9.5, &t), Severity::Critical);
    }

    #[test]
    fn test_global_outscores_cache() {
        let scoring = ScoringConfig::default();
        let thresholds = ThresholdConfig::default();
        let ctx = ScoreContext::default();

        let global = score_race(&race("global:session", Severity::High), &ctx, &scoring, &thresholds);
        let cache = score_race(&race("cache:session", Severity::High), &ctx, &scoring, &thresholds);
        assert!(global.value >= cache.value);
    }

    #[test]
    fn test_async_access_raises_score() {
        let scoring = ScoringConfig::default();
        let thresholds = ThresholdConfig::default();
        let ctx = ScoreContext::default();

        let sync = race("module:app#counter", Severity::High);
        let mut with_async = sync.clone();
        with_async.accesses[0].is_async = true;

        let s = score_race(&sync, &ctx, &scoring, &thresholds);
        let a = score_race(&with_async, &ctx, &scoring, &thresholds);
        assert!(a.value > s.value);
    }

    #[test]
    fn test_full_mitigation_caps_at_medium() {
        let scoring = ScoringConfig::default();
        let thresholds = ThresholdConfig::default();
        let ctx = ScoreContext {
            flow_count: 5,
            entry_point_count: 5,
            extra_atom_count: 10,
        };

        let mut r = race("global:session", Severity::Critical);
        r.accesses[0].is_async = true;
        r.mitigation = Mitigation {
            has_mitigation: true,
            kind: MitigationKind::Lock,
            confidence: Confidence::High,
            details: String::new(),
        };

        let score = score_race(&r, &ctx, &scoring, &thresholds);
        assert!(score.severity <= Severity::Medium, "got {:?}", score.severity);
    }

    #[test]
    fn test_sequential_timing_reduces_score() {
        let scoring = ScoringConfig::default();
        let thresholds = ThresholdConfig::default();
        let ctx = ScoreContext::default();

        let concurrent = race("module:app#counter", Severity::High);
        let mut sequential = concurrent.clone();
        sequential.timing.can_run_concurrently = false;

        let c = score_race(&concurrent, &ctx, &scoring, &thresholds);
        let s = score_race(&sequential, &ctx, &scoring, &thresholds);
        assert!(s.value < c.value);
    }

    #[test]
    fn test_breakdown_sums_to_value_when_unclamped() {
        let scoring = ScoringConfig::default();
        let thresholds = ThresholdConfig::default();
        let ctx = ScoreContext {
            flow_count: 1,
            entry_point_count: 2,
            extra_atom_count: 1,
        };

        let score = score_race(&race("module:app#counter", Severity::Medium), &ctx, &scoring, &thresholds);
        let sum: f64 = score.breakdown.iter().map(|f| f.contribution).sum();
        assert!((sum.clamp(0.0, 10.0) - score.value).abs() < 1e-9);
    }

    #[test]
    fn test_recommendation_varies_by_type() {
        let a = recommendation(Severity::High, "init-race");
        let b = recommendation(Severity::High, "write-write");
        assert_ne!(a, b);
        assert!(a.contains("initialization"));
    }
}

//! Configuration file parsing for .racewatch.toml
//!
//! The numeric weights and thresholds here are policy, not semantics: the
//! engine only guarantees the relative orderings (global outranks cache,
//! write-write outranks read-write, and so on). Hosts can retune every number
//! through `.racewatch.toml` without touching the engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure for .racewatch.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RacewatchConfig {
    pub scoring: ScoringConfig,

    pub thresholds: ThresholdConfig,

    pub timing: TimingConfig,

    /// Per-race-type severity overrides, e.g. `cache-race = "high"`
    pub severity_overrides: HashMap<String, String>,
}

impl RacewatchConfig {
    /// Load configuration from a specific file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: RacewatchConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load `.racewatch.toml` from the given directory, falling back to
    /// defaults when the file does not exist
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(".racewatch.toml");
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the configuration to a file as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Weights for the risk score's independent factors.
///
/// Each factor is bounded, so the clamped total stays deterministic and
/// explainable through the per-factor breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Race-type weight per pattern-default severity
    pub type_weight_low: f64,
    pub type_weight_medium: f64,
    pub type_weight_high: f64,
    pub type_weight_critical: f64,

    /// Added when either access is asynchronous
    pub async_weight: f64,

    /// Data-integrity base per state category. Relative order is contractual:
    /// global > database > module-scope > cache > filesystem.
    pub category_global: f64,
    pub category_database: f64,
    pub category_module_scope: f64,
    pub category_cache: f64,
    pub category_queue: f64,
    pub category_filesystem: f64,

    /// Data-integrity multiplier per race type
    pub multiplier_write_write: f64,
    pub multiplier_init_race: f64,
    pub multiplier_default: f64,

    /// Scope/impact weight per reachable business flow and entry point
    pub scope_per_flow: f64,
    pub scope_per_entry_point: f64,
    pub scope_cap: f64,

    /// Frequency weight per extra atom touching the same state key
    pub frequency_per_atom: f64,
    pub frequency_cap: f64,

    /// Subtracted per mitigation confidence tier
    pub mitigation_penalty_high: f64,
    pub mitigation_penalty_medium: f64,
    pub mitigation_penalty_low: f64,

    /// Subtracted when timing judged the pair sequential (below the
    /// high-confidence tier, which suppresses the race outright)
    pub sequential_reduction: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            type_weight_low: 1.0,
            type_weight_medium: 2.0,
            type_weight_high: 3.0,
            type_weight_critical: 3.5,

            async_weight: 1.5,

            category_global: 2.2,
            category_database: 1.9,
            category_module_scope: 1.6,
            category_cache: 1.2,
            category_queue: 1.0,
            category_filesystem: 0.9,

            multiplier_write_write: 1.5,
            multiplier_init_race: 1.3,
            multiplier_default: 1.0,

            scope_per_flow: 0.4,
            scope_per_entry_point: 0.5,
            scope_cap: 2.0,

            frequency_per_atom: 0.25,
            frequency_cap: 1.5,

            mitigation_penalty_high: 3.0,
            mitigation_penalty_medium: 1.5,
            mitigation_penalty_low: 0.5,

            sequential_reduction: 2.0,
        }
    }
}

/// Severity bucket boundaries over the clamped [0, 10] score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Scores below this are `low`
    pub medium: f64,

    /// Scores below this (and at or above `medium`) are `medium`
    pub high: f64,

    /// Scores below this are `high`; at or above, `critical`
    pub critical: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            medium: 3.0,
            high: 6.0,
            critical: 8.0,
        }
    }
}

/// Call-graph traversal limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Upper bound on upward caller traversal. Cyclic call graphs are handled
    /// by the visited set; the depth bound keeps pathological fan-in cheap.
    pub max_caller_depth: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_caller_depth: 16,
        }
    }
}

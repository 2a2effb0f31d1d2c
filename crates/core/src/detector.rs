//! Orchestrator — runs Collect → Classify → Mitigate → Time → Score
//!
//! One analysis pass over a read-only [`Project`]. Collection fans out per
//! atom via rayon and merges sequentially into an ordered map; enrichment
//! fans out per race. All phases are pure, so the pass is idempotent:
//! re-running on an unchanged project yields byte-identical races.

use crate::collector;
use crate::config::RacewatchConfig;
use crate::graph::AtomCallGraph;
use crate::mitigation;
use crate::pattern::{self, PatternRegistry};
use crate::project::{AtomIndex, Project};
use crate::race::{AnalysisSummary, Confidence, Race, Severity, SharedStateAccess};
use crate::scoring::{self, ScoreContext};
use crate::timing;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The race-detection engine, configured once and reusable across projects
pub struct RaceDetector {
    config: RacewatchConfig,
    registry: PatternRegistry,
}

impl RaceDetector {
    /// Detector with default config and the built-in pattern registry
    pub fn new() -> Self {
        Self::with_config(RacewatchConfig::default())
    }

    /// Detector with the built-in registry and the given policy config
    pub fn with_config(config: RacewatchConfig) -> Self {
        Self::with_registry(config, PatternRegistry::with_builtins())
    }

    /// Detector over a caller-supplied registry. Config severity overrides
    /// are applied to the registry here, once.
    pub fn with_registry(config: RacewatchConfig, mut registry: PatternRegistry) -> Self {
        for (type_id, name) in &config.severity_overrides {
            match Severity::from_name(name) {
                Some(severity) => {
                    if !registry.override_severity(type_id, severity) {
                        tracing::warn!(%type_id, "severity override targets unknown race type");
                    }
                }
                None => {
                    tracing::warn!(%type_id, value = %name, "ignoring invalid severity override");
                }
            }
        }
        Self { config, registry }
    }

    /// Mutable access to the registry for runtime pattern registration
    pub fn registry_mut(&mut self) -> &mut PatternRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &RacewatchConfig {
        &self.config
    }

    /// Run the full detection pass over one project.
    pub fn analyze(&self, project: &Project) -> RaceAnalysis {
        let index = AtomIndex::build(project);

        // ── Collect ─────────────────────────────────────────────
        let per_atom: Vec<Vec<SharedStateAccess>> = index
            .atoms()
            .par_iter()
            .map(|atom| {
                collector::collect_atom(atom, index.file_of(&atom.id), index.module_of(&atom.id))
            })
            .collect();
        let accesses = collector::merge_accesses(per_atom);
        tracing::debug!(
            state_keys = accesses.len(),
            atoms = index.len(),
            "collection complete"
        );

        // ── Classify ────────────────────────────────────────────
        let mut races = pattern::classify_accesses(&accesses, &self.registry);
        tracing::debug!(races = races.len(), "classification complete");

        // ── Mitigate → Time → Score, per race ───────────────────
        let graph = AtomCallGraph::build(&index);
        let atoms_per_key: HashMap<&str, BTreeSet<&str>> = accesses
            .iter()
            .map(|(key, list)| {
                (
                    key.as_str(),
                    list.iter().map(|a| a.atom_id.as_str()).collect(),
                )
            })
            .collect();

        races.par_iter_mut().for_each(|race| {
            race.mitigation = mitigation::analyze_mitigation(race, &index);
            race.timing = timing::analyze_timing(race, &index, &graph, &self.config.timing);

            let ctx = self.score_context(race, &index, &graph, &atoms_per_key);
            race.risk_score =
                scoring::score_race(race, &ctx, &self.config.scoring, &self.config.thresholds);
            race.severity = race.risk_score.severity;
        });

        // Pairs proven sequential drop out; lower-confidence sequential
        // verdicts were kept and score-reduced instead
        races.retain(|race| {
            race.timing.can_run_concurrently || race.timing.confidence != Confidence::High
        });
        races.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(races = races.len(), "enrichment complete");

        RaceAnalysis::build(races, &index)
    }

    fn score_context(
        &self,
        race: &Race,
        index: &AtomIndex,
        graph: &AtomCallGraph,
        atoms_per_key: &HashMap<&str, BTreeSet<&str>>,
    ) -> ScoreContext {
        let [a, b] = &race.accesses;

        let mut flows: BTreeSet<&str> = BTreeSet::new();
        for atom_id in [&a.atom_id, &b.atom_id] {
            if let Some(atom) = index.atom(atom_id) {
                for membership in index.flows_of(&atom.name) {
                    flows.insert(membership.flow);
                }
            }
        }

        let depth = self.config.timing.max_caller_depth;
        let mut entries = graph.entry_points_reaching(&a.atom_id, depth);
        entries.extend(graph.entry_points_reaching(&b.atom_id, depth));

        let extra_atom_count = atoms_per_key
            .get(race.state_key.as_str())
            .map(|atoms| {
                let in_pair = atoms.contains(a.atom_id.as_str()) as usize
                    + (b.atom_id != a.atom_id && atoms.contains(b.atom_id.as_str())) as usize;
                atoms.len().saturating_sub(in_pair)
            })
            .unwrap_or(0);

        ScoreContext {
            flow_count: flows.len(),
            entry_point_count: entries.len(),
            extra_atom_count,
        }
    }
}

impl Default for RaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// The aggregated result of one detection pass, indexed for query access
pub struct RaceAnalysis {
    races: Vec<Race>,
    by_module: BTreeMap<String, Vec<usize>>,
    by_file: BTreeMap<String, Vec<usize>>,
    summary: AnalysisSummary,
}

impl RaceAnalysis {
    fn build(races: Vec<Race>, index: &AtomIndex) -> Self {
        let mut by_module: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut by_file: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut summary = AnalysisSummary {
            total_races: races.len(),
            ..Default::default()
        };

        for (i, race) in races.iter().enumerate() {
            let mut modules: Vec<&str> = race
                .accesses
                .iter()
                .map(|a| index.module_of(&a.atom_id))
                .collect();
            modules.dedup();
            for module in modules {
                by_module.entry(module.to_string()).or_default().push(i);
            }

            let mut files: Vec<&str> = race.accesses.iter().map(|a| a.file.as_str()).collect();
            files.dedup();
            for file in files {
                by_file.entry(file.to_string()).or_default().push(i);
            }

            *summary
                .by_severity
                .entry(race.severity.to_string())
                .or_default() += 1;
            *summary.by_type.entry(race.race_type.clone()).or_default() += 1;
        }

        Self {
            races,
            by_module,
            by_file,
            summary,
        }
    }

    /// All detected races, sorted by id
    pub fn races(&self) -> &[Race] {
        &self.races
    }

    /// Look up one race by its deterministic id
    pub fn race(&self, id: &str) -> Option<&Race> {
        self.races.iter().find(|r| r.id == id)
    }

    /// Races with at least one access inside the given module
    pub fn races_by_module(&self, module: &str) -> Vec<&Race> {
        self.by_module
            .get(module)
            .map(|indices| indices.iter().map(|&i| &self.races[i]).collect())
            .unwrap_or_default()
    }

    /// Races with at least one access inside the given file
    pub fn races_by_file(&self, file: &str) -> Vec<&Race> {
        self.by_file
            .get(file)
            .map(|indices| indices.iter().map(|&i| &self.races[i]).collect())
            .unwrap_or_default()
    }

    /// Module names that have at least one race
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.by_module.keys().map(String::as_str)
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}

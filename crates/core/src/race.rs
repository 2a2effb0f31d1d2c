//! Race types that bridge detection results to output formatters

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// How an atom touches a shared state location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessKind {
    Read,
    Write,
    /// A write guarded by a not-yet-initialized check
    Init,
    /// Registration of an event handler on a shared emitter
    EventHandle,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
            AccessKind::Init => write!(f, "init"),
            AccessKind::EventHandle => write!(f, "event-handle"),
        }
    }
}

/// Category of a shared state location, inferred from naming and access
/// idiom rather than type information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateCategory {
    Global,
    ModuleScope,
    Database,
    Filesystem,
    Cache,
    Queue,
}

impl StateCategory {
    /// Recover the category from a normalized state key's prefix
    pub fn from_state_key(key: &str) -> Self {
        match key.split(':').next().unwrap_or("") {
            "global" => StateCategory::Global,
            "db" => StateCategory::Database,
            "fs" => StateCategory::Filesystem,
            "cache" => StateCategory::Cache,
            "queue" => StateCategory::Queue,
            _ => StateCategory::ModuleScope,
        }
    }
}

impl std::fmt::Display for StateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateCategory::Global => write!(f, "global"),
            StateCategory::ModuleScope => write!(f, "module-scope"),
            StateCategory::Database => write!(f, "database"),
            StateCategory::Filesystem => write!(f, "filesystem"),
            StateCategory::Cache => write!(f, "cache"),
            StateCategory::Queue => write!(f, "queue"),
        }
    }
}

/// Severity bucket for a race
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Severity {
    /// Parse a severity name as used in config files and CLI flags
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Confidence tier for mitigation and timing verdicts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// One observed access to a shared state location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedStateAccess {
    /// Atom performing the access
    pub atom_id: String,

    /// File containing the atom
    pub file: String,

    /// Normalized key of the shared location
    pub state_key: String,

    pub access_type: AccessKind,

    /// The source line the access was detected on
    pub code: String,

    /// 1-based line number within the atom's code
    pub line: usize,

    /// Whether the access sits in an asynchronous context
    pub is_async: bool,

    /// Whether the access is guarded by a not-yet-initialized check
    pub is_lazy: bool,
}

/// Kind of protective construct detected around a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MitigationKind {
    Lock,
    Transaction,
    Queue,
    Immutable,
    #[default]
    None,
}

impl std::fmt::Display for MitigationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MitigationKind::Lock => write!(f, "lock"),
            MitigationKind::Transaction => write!(f, "transaction"),
            MitigationKind::Queue => write!(f, "queue"),
            MitigationKind::Immutable => write!(f, "immutable"),
            MitigationKind::None => write!(f, "none"),
        }
    }
}

/// Protective construct detected (or not) around a race
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Mitigation {
    pub has_mitigation: bool,

    #[serde(rename = "type")]
    pub kind: MitigationKind,

    pub confidence: Confidence,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl Mitigation {
    /// A lock, transaction, or queue shared by both sides at high confidence
    /// fully neutralizes the race
    pub fn is_full(&self) -> bool {
        self.has_mitigation
            && self.confidence == Confidence::High
            && matches!(
                self.kind,
                MitigationKind::Lock | MitigationKind::Transaction | MitigationKind::Queue
            )
    }
}

/// Whether two accesses can plausibly execute concurrently
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimingVerdict {
    pub can_run_concurrently: bool,

    /// Entry points from which both accesses are reachable
    pub shared_entry_points: Vec<String>,

    pub same_business_flow: bool,

    pub confidence: Confidence,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl Default for TimingVerdict {
    /// The conservative verdict: assume concurrency until proven otherwise
    fn default() -> Self {
        Self {
            can_run_concurrently: true,
            shared_entry_points: Vec::new(),
            same_business_flow: false,
            confidence: Confidence::Low,
            details: String::new(),
        }
    }
}

/// One factor's contribution to a risk score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactor {
    pub factor: String,
    pub contribution: f64,
}

/// Weighted, bounded risk score with a per-factor breakdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    /// Clamped to [0, 10]
    pub value: f64,

    pub breakdown: Vec<ScoreFactor>,

    pub severity: Severity,

    pub testing_recommendation: String,
}

/// A conflicting pair of accesses to the same state key.
///
/// Created during classification and enriched in place by the mitigation,
/// timing, and scoring phases. Reported at most once per unordered access
/// pair per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    /// Deterministic id derived from the state key and sorted atom ids
    pub id: String,

    #[serde(rename = "type")]
    pub race_type: String,

    pub state_key: String,

    pub state_type: StateCategory,

    pub severity: Severity,

    /// Exactly two accesses, in (atom id, line) order
    pub accesses: [SharedStateAccess; 2],

    pub mitigation: Mitigation,

    pub timing: TimingVerdict,

    pub risk_score: RiskScore,

    pub description: String,
}

/// Derive the deterministic race id for an unordered access pair.
///
/// The atom ids are sorted before hashing so that `(a, b)` and `(b, a)`
/// produce the same id.
pub fn race_id(state_key: &str, atom_a: &str, atom_b: &str) -> String {
    let (lo, hi) = if atom_a <= atom_b {
        (atom_a, atom_b)
    } else {
        (atom_b, atom_a)
    };
    let mut hasher = Sha256::new();
    hasher.update(state_key.as_bytes());
    hasher.update(b"|");
    hasher.update(lo.as_bytes());
    hasher.update(b"|");
    hasher.update(hi.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("RACE-{hex}")
}

/// Project-level rollup of an analysis pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_races: usize,

    /// Race counts keyed by final severity name
    pub by_severity: BTreeMap<String, usize>,

    /// Race counts keyed by race type
    pub by_type: BTreeMap<String, usize>,
}

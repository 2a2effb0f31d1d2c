//! Race pattern registry and pair classifier
//!
//! The registry is an explicit, ordered collection of `{ metadata, predicate }`
//! entries. Iteration order is priority order (ties broken by registration
//! order), kept deterministic so reruns classify identically. Callers may
//! register new patterns at runtime, unregister them through the returned
//! handle, or override a type's default severity and mitigation strategies.

pub mod matchers;

pub use matchers::is_conflicting;

use crate::race::{
    race_id, MitigationKind, Race, SharedStateAccess, Severity, StateCategory,
};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Matcher predicate over an unordered access pair
pub type MatcherFn = dyn Fn(&SharedStateAccess, &SharedStateAccess) -> bool + Send + Sync;

/// Metadata carried by a registered race pattern
#[derive(Debug, Clone)]
pub struct RacePattern {
    /// Stable race-type identifier, e.g. `write-write`
    pub type_id: String,

    /// Human-readable name used in race descriptions
    pub name: String,

    /// Default severity before mitigation/timing/scoring refine it
    pub severity: Severity,

    /// Candidate mitigation strategies, most applicable first
    pub mitigations: Vec<MitigationKind>,

    /// Lower values are tried first; ties keep registration order
    pub priority: u32,
}

/// Handle returned by [`PatternRegistry::register`] for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternHandle(u64);

struct RegistryEntry {
    handle: PatternHandle,
    meta: RacePattern,
    matcher: Box<MatcherFn>,
}

/// Ordered, runtime-extensible collection of race patterns
pub struct PatternRegistry {
    entries: Vec<RegistryEntry>,
    next_handle: u64,
}

impl PatternRegistry {
    /// Create an empty registry (no built-in patterns)
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
        }
    }

    /// Create a registry preloaded with the built-in race patterns
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            RacePattern {
                type_id: "init-race".to_string(),
                name: "Competing lazy initialization".to_string(),
                severity: Severity::High,
                mitigations: vec![MitigationKind::Lock],
                priority: 10,
            },
            Box::new(matchers::init_race),
        );
        registry.register(
            RacePattern {
                type_id: "counter-increment".to_string(),
                name: "Unguarded counter increment".to_string(),
                severity: Severity::High,
                mitigations: vec![MitigationKind::Lock, MitigationKind::Queue],
                priority: 20,
            },
            Box::new(matchers::counter_increment),
        );
        registry.register(
            RacePattern {
                type_id: "array-mutation".to_string(),
                name: "Concurrent array mutation".to_string(),
                severity: Severity::Medium,
                mitigations: vec![
                    MitigationKind::Lock,
                    MitigationKind::Immutable,
                    MitigationKind::Queue,
                ],
                priority: 30,
            },
            Box::new(matchers::array_mutation),
        );
        registry.register(
            RacePattern {
                type_id: "event-handler-conflict".to_string(),
                name: "Concurrent event handler registration".to_string(),
                severity: Severity::Medium,
                mitigations: vec![MitigationKind::Queue],
                priority: 40,
            },
            Box::new(matchers::event_handler_conflict),
        );
        registry.register(
            RacePattern {
                type_id: "database-update".to_string(),
                name: "Concurrent database update".to_string(),
                severity: Severity::High,
                mitigations: vec![MitigationKind::Transaction, MitigationKind::Lock],
                priority: 50,
            },
            Box::new(matchers::database_update),
        );
        registry.register(
            RacePattern {
                type_id: "cache-race".to_string(),
                name: "Cache read/write race".to_string(),
                severity: Severity::Medium,
                mitigations: vec![MitigationKind::Lock, MitigationKind::Queue],
                priority: 60,
            },
            Box::new(matchers::cache_race),
        );
        registry.register(
            RacePattern {
                type_id: "file-write".to_string(),
                name: "Concurrent file write".to_string(),
                severity: Severity::Medium,
                mitigations: vec![MitigationKind::Lock, MitigationKind::Queue],
                priority: 70,
            },
            Box::new(matchers::file_write),
        );
        registry.register(
            RacePattern {
                type_id: "write-write".to_string(),
                name: "Write-write race".to_string(),
                severity: Severity::High,
                mitigations: vec![
                    MitigationKind::Lock,
                    MitigationKind::Queue,
                    MitigationKind::Immutable,
                ],
                priority: 80,
            },
            Box::new(matchers::write_write),
        );
        registry.register(
            RacePattern {
                type_id: "read-write".to_string(),
                name: "Read-write race".to_string(),
                severity: Severity::Medium,
                mitigations: vec![MitigationKind::Lock, MitigationKind::Immutable],
                priority: 90,
            },
            Box::new(matchers::read_write),
        );

        registry
    }

    /// Register a pattern; entries are kept in priority order (stable within
    /// equal priorities). Returns a handle usable with [`unregister`].
    ///
    /// [`unregister`]: PatternRegistry::unregister
    pub fn register(&mut self, meta: RacePattern, matcher: Box<MatcherFn>) -> PatternHandle {
        let handle = PatternHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(RegistryEntry {
            handle,
            meta,
            matcher,
        });
        self.entries.sort_by_key(|e| (e.meta.priority, e.handle.0));
        handle
    }

    /// Remove a previously registered pattern. Returns false for a stale or
    /// unknown handle.
    pub fn unregister(&mut self, handle: PatternHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    /// Override the default severity for every entry of a race type.
    /// Returns false when the type is not registered.
    pub fn override_severity(&mut self, type_id: &str, severity: Severity) -> bool {
        let mut hit = false;
        for entry in &mut self.entries {
            if entry.meta.type_id == type_id {
                entry.meta.severity = severity;
                hit = true;
            }
        }
        hit
    }

    /// Override the candidate mitigation strategies for a race type
    pub fn override_mitigations(
        &mut self,
        type_id: &str,
        mitigations: Vec<MitigationKind>,
    ) -> bool {
        let mut hit = false;
        for entry in &mut self.entries {
            if entry.meta.type_id == type_id {
                entry.meta.mitigations = mitigations.clone();
                hit = true;
            }
        }
        hit
    }

    /// Metadata for the first entry matching a race type
    pub fn pattern(&self, type_id: &str) -> Option<&RacePattern> {
        self.entries
            .iter()
            .map(|e| &e.meta)
            .find(|m| m.type_id == type_id)
    }

    /// Default severity for a race type, if registered
    pub fn severity_of(&self, type_id: &str) -> Option<Severity> {
        self.pattern(type_id).map(|m| m.severity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first pattern matching this pair, in priority order.
    ///
    /// A matcher that panics (a defective runtime-registered predicate) is
    /// isolated for this pair, logged, and skipped — the remaining matchers
    /// still run.
    pub fn classify_pair(
        &self,
        a: &SharedStateAccess,
        b: &SharedStateAccess,
    ) -> Option<&RacePattern> {
        for entry in &self.entries {
            let matched = catch_unwind(AssertUnwindSafe(|| (entry.matcher)(a, b)));
            match matched {
                Ok(true) => return Some(&entry.meta),
                Ok(false) => {}
                Err(_) => {
                    tracing::warn!(
                        pattern = %entry.meta.type_id,
                        state_key = %a.state_key,
                        "matcher panicked; skipping it for this pair"
                    );
                }
            }
        }
        None
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Classify every conflicting unordered pair in the collected access map.
///
/// For each state key with two or more accesses, each unordered pair is
/// tested against the registry. Pairs with no structural conflict are
/// skipped; conflicting pairs that match no registered pattern fall back to a
/// generic `conflict:<a>-<b>` type at Low severity rather than being dropped.
/// At most one race is emitted per state key and unordered atom pair: when
/// several access pairs share the same atom pair (a guard-line read next to a
/// lazy write, say), the most specific classification wins.
pub fn classify_accesses(
    accesses_by_key: &BTreeMap<String, Vec<SharedStateAccess>>,
    registry: &PatternRegistry,
) -> Vec<Race> {
    let mut races: Vec<Race> = Vec::new();
    let mut best: HashMap<String, (u32, usize)> = HashMap::new();

    for (key, accesses) in accesses_by_key {
        if accesses.len() < 2 {
            continue;
        }

        for i in 0..accesses.len() {
            for j in (i + 1)..accesses.len() {
                let a = &accesses[i];
                let b = &accesses[j];

                if !matchers::is_conflicting(a, b) {
                    continue;
                }

                let id = race_id(key, &a.atom_id, &b.atom_id);
                let (priority, race_type, name, severity) = match registry.classify_pair(a, b) {
                    Some(meta) => (
                        meta.priority,
                        meta.type_id.clone(),
                        meta.name.clone(),
                        meta.severity,
                    ),
                    None => (
                        u32::MAX,
                        fallback_type(a, b),
                        "Unclassified access conflict".to_string(),
                        Severity::Low,
                    ),
                };

                match best.get(&id) {
                    Some(&(best_priority, idx)) => {
                        if priority < best_priority {
                            races[idx] = build_race(id.clone(), race_type, name, severity, key, a, b);
                            best.insert(id, (priority, idx));
                        }
                    }
                    None => {
                        best.insert(id.clone(), (priority, races.len()));
                        races.push(build_race(id, race_type, name, severity, key, a, b));
                    }
                }
            }
        }
    }

    races
}

/// Generic race type for conflicting pairs no matcher claimed
fn fallback_type(a: &SharedStateAccess, b: &SharedStateAccess) -> String {
    let mut kinds = [a.access_type.to_string(), b.access_type.to_string()];
    kinds.sort();
    format!("conflict:{}-{}", kinds[0], kinds[1])
}

fn build_race(
    id: String,
    race_type: String,
    name: String,
    severity: Severity,
    key: &str,
    a: &SharedStateAccess,
    b: &SharedStateAccess,
) -> Race {
    // Stable access ordering inside the race keeps output byte-identical
    let (first, second) = if (&a.atom_id, a.line) <= (&b.atom_id, b.line) {
        (a, b)
    } else {
        (b, a)
    };

    let description = format!(
        "{name} on `{key}`: {} in `{}` ({}:{}) conflicts with {} in `{}` ({}:{})",
        first.access_type,
        first.atom_id,
        first.file,
        first.line,
        second.access_type,
        second.atom_id,
        second.file,
        second.line,
    );

    Race {
        id,
        race_type,
        state_key: key.to_string(),
        state_type: StateCategory::from_state_key(key),
        severity,
        accesses: [first.clone(), second.clone()],
        mitigation: Default::default(),
        timing: Default::default(),
        risk_score: Default::default(),
        description,
    }
}

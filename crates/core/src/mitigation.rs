//! Mitigation analyzer — detects protective constructs around a race
//!
//! Inspects the code of both access sites (and their enclosing atoms) for
//! lock wrapping, transactional boundaries, serialized-queue dispatch, and
//! immutable-update idioms. A race counts as fully mitigated only when both
//! sides independently resolve to the *same* lock, transaction, or queue
//! identifier; matching evidence with different identifiers is reported but
//! does not clear the race. Absence of evidence is never an error.

use crate::project::AtomIndex;
use crate::race::{Confidence, Mitigation, MitigationKind, Race};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn lock_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([\w$]+)\.(?:acquire|release|lock|unlock|runExclusive)\s*\(").unwrap()
    })
}

fn with_lock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bwithLock\s*\(\s*([\w$]+)").unwrap())
}

fn lock_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([\w$]*(?:[Ll]ock|[Mm]utex|[Ss]emaphore)[\w$]*)\.[\w$]+\s*\(").unwrap()
    })
}

fn transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([\w$]+)\.(?:\$)?transaction\s*\(").unwrap())
}

fn with_transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bwithTransaction\s*\(|\bstartTransaction\s*\(").unwrap())
}

fn sql_transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bBEGIN\b|\bSTART\s+TRANSACTION\b").unwrap())
}

fn queue_dispatch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([\w$]*[Qq]ueue[\w$]*)\.(?:add|push|enqueue|publish|send|process|dispatch|runExclusive)\s*\(")
            .unwrap()
    })
}

fn dispatch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([\w$]+)\.dispatch\s*\(").unwrap())
}

fn immutable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.\.\.|\.concat\s*\(|\.slice\s*\(|\.toSpliced\s*\(|\.toSorted\s*\(|Object\.freeze\s*\(|Object\.assign\s*\(\s*\{\s*\}")
            .unwrap()
    })
}

/// Extract candidate lock identifiers from an atom's code
fn lock_identifiers(code: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for caps in lock_call_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    for caps in with_lock_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    for caps in lock_name_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    names
}

/// Extract transactional-boundary identifiers from an atom's code
fn transaction_identifiers(code: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for caps in transaction_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    if with_transaction_re().is_match(code) {
        names.insert("transaction".to_string());
    }
    if sql_transaction_re().is_match(code) {
        names.insert("sql-transaction".to_string());
    }
    names
}

/// Extract serialized-queue identifiers from an atom's code
fn queue_identifiers(code: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for caps in queue_dispatch_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    for caps in dispatch_re().captures_iter(code) {
        names.insert(caps[1].to_string());
    }
    names
}

/// Whether the access site updates state through non-mutating idioms
fn uses_immutable_update(access_code: &str) -> bool {
    immutable_re().is_match(access_code)
}

/// Analyze the protective constructs around one race.
///
/// Never fails: every branch degrades to `hasMitigation: false` when the
/// evidence is missing or inconsistent across the two sides.
pub fn analyze_mitigation(race: &Race, index: &AtomIndex) -> Mitigation {
    let [a, b] = &race.accesses;

    // The enclosing atom's full code is the search window; fall back to the
    // access snippet when the atom is unknown (defensive for partial input)
    let code_a = index
        .atom(&a.atom_id)
        .map(|at| at.code.as_str())
        .unwrap_or(a.code.as_str());
    let code_b = index
        .atom(&b.atom_id)
        .map(|at| at.code.as_str())
        .unwrap_or(b.code.as_str());

    let locks_a = lock_identifiers(code_a);
    let locks_b = lock_identifiers(code_b);
    if let Some(shared) = locks_a.intersection(&locks_b).next() {
        return Mitigation {
            has_mitigation: true,
            kind: MitigationKind::Lock,
            confidence: Confidence::High,
            details: format!("both accesses guarded by lock `{shared}`"),
        };
    }

    let txn_a = transaction_identifiers(code_a);
    let txn_b = transaction_identifiers(code_b);
    if let Some(shared) = txn_a.intersection(&txn_b).next() {
        return Mitigation {
            has_mitigation: true,
            kind: MitigationKind::Transaction,
            confidence: Confidence::High,
            details: format!("both accesses execute inside `{shared}` transaction boundary"),
        };
    }

    let queues_a = queue_identifiers(code_a);
    let queues_b = queue_identifiers(code_b);
    if let Some(shared) = queues_a.intersection(&queues_b).next() {
        return Mitigation {
            has_mitigation: true,
            kind: MitigationKind::Queue,
            confidence: Confidence::High,
            details: format!("both accesses dispatch through serialized queue `{shared}`"),
        };
    }

    // Immutable updates on both sides downgrade without fully clearing
    if uses_immutable_update(&a.code) && uses_immutable_update(&b.code) {
        return Mitigation {
            has_mitigation: true,
            kind: MitigationKind::Immutable,
            confidence: Confidence::Medium,
            details: "both accesses use non-mutating update idioms".to_string(),
        };
    }

    // Lock-like evidence that does not line up across the two sides: worth
    // surfacing, but it neutralizes nothing
    if !locks_a.is_empty() && !locks_b.is_empty() {
        return Mitigation {
            has_mitigation: false,
            kind: MitigationKind::None,
            confidence: Confidence::Low,
            details: format!(
                "accesses use different locks ({} vs {})",
                join(&locks_a),
                join(&locks_b)
            ),
        };
    }

    Mitigation {
        has_mitigation: false,
        kind: MitigationKind::None,
        confidence: Confidence::Low,
        details: String::new(),
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

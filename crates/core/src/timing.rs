//! Timing analyzer — decides whether a race's accesses can truly interleave
//!
//! Walks the call graph upward from each access to discoverable entry points
//! and judges the pair sequential (same atom with ordered lines and no
//! suspension point, or a single shared caller invoking both in a fixed
//! sequence) or concurrent (independent entry points, fan-out dispatch from a
//! common caller, or lifecycle hooks bound to the same phase). When the graph
//! is too shallow to decide, the verdict fails open: concurrent at low
//! confidence, so the race is reported rather than silently dropped.

use crate::config::TimingConfig;
use crate::graph::AtomCallGraph;
use crate::project::{Atom, AtomIndex};
use crate::race::{Confidence, Race, TimingVerdict};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn suspension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bawait\b|\.then\s*\(|\.catch\s*\(|\.finally\s*\(|setTimeout\s*\(|setInterval\s*\(|setImmediate\s*\(|process\.nextTick\s*\(|yield\b")
            .unwrap()
    })
}

fn promise_fanout_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Promise\s*\.\s*(?:all|allSettled|race|any)\s*\(").unwrap())
}

/// Hook names that run during shutdown. Checked before the startup list so
/// `unmount` does not read as `mount`.
const SHUTDOWN_HOOKS: &[&str] = &[
    "teardown", "destroy", "shutdown", "unmount", "dispose", "cleanup", "onexit", "onclose",
];

const STARTUP_HOOKS: &[&str] = &[
    "init", "setup", "start", "boot", "mount", "onload", "onready", "register", "bootstrap",
    "configure",
];

/// Analyze whether the two accesses of a race can execute concurrently.
///
/// Pure function of the race, the project index, and the prebuilt call
/// graph. Never fails; an undecidable pair yields the conservative
/// concurrent-at-low-confidence verdict.
pub fn analyze_timing(
    race: &Race,
    index: &AtomIndex,
    graph: &AtomCallGraph,
    config: &TimingConfig,
) -> TimingVerdict {
    let [a, b] = &race.accesses;
    let depth = config.max_caller_depth;

    if a.atom_id == b.atom_id {
        return same_atom_verdict(race, index, graph, depth);
    }

    let entries_a = graph.entry_points_reaching(&a.atom_id, depth);
    let entries_b = graph.entry_points_reaching(&b.atom_id, depth);
    let shared: Vec<String> = entries_a
        .intersection(&entries_b)
        .map(|s| s.to_string())
        .collect();

    let name_a = index.atom(&a.atom_id).map(|at| at.name.as_str());
    let name_b = index.atom(&b.atom_id).map(|at| at.name.as_str());
    let same_flow = match (name_a, name_b) {
        (Some(na), Some(nb)) => !index.shared_flows(na, nb).is_empty(),
        _ => false,
    };

    // Fan-out from a shared ancestor: both results awaited together, or both
    // fired without awaiting either
    if let (Some(na), Some(nb)) = (name_a, name_b) {
        for caller in graph.common_callers(&a.atom_id, &b.atom_id, depth) {
            if caller_fans_out(caller, na, nb, index) {
                return TimingVerdict {
                    can_run_concurrently: true,
                    shared_entry_points: shared,
                    same_business_flow: same_flow,
                    confidence: Confidence::High,
                    details: format!("`{}` dispatches both accesses in parallel", caller.id),
                };
            }
        }
    }

    // Same business flow: the steps form one logical sequential operation,
    // so downgrade even without full graph proof (fan-out above still wins)
    if same_flow {
        return TimingVerdict {
            can_run_concurrently: false,
            shared_entry_points: shared,
            same_business_flow: true,
            confidence: Confidence::Low,
            details: "accesses are ordered steps of the same business flow".to_string(),
        };
    }

    // Reachable only from disjoint roots: nothing orders the two accesses
    if !entries_a.is_empty() && !entries_b.is_empty() && shared.is_empty() {
        return TimingVerdict {
            can_run_concurrently: true,
            shared_entry_points: Vec::new(),
            same_business_flow: same_flow,
            confidence: Confidence::High,
            details: format!(
                "accesses reachable from independent entry points ({} vs {})",
                join_entries(&entries_a),
                join_entries(&entries_b)
            ),
        };
    }

    // Lifecycle hooks bound to the same execution phase fire together even
    // without a visible shared caller
    if let (Some(na), Some(nb)) = (name_a, name_b) {
        if let (Some(phase_a), Some(phase_b)) = (lifecycle_phase(na), lifecycle_phase(nb)) {
            if phase_a == phase_b {
                return TimingVerdict {
                    can_run_concurrently: true,
                    shared_entry_points: shared,
                    same_business_flow: same_flow,
                    confidence: Confidence::Medium,
                    details: format!("both atoms are {phase_a} lifecycle hooks"),
                };
            }
        }
    }

    // A single shared caller invoking both in source order is a fixed
    // sequence; fan-out was already ruled out above
    let callers_a = graph.direct_callers(&a.atom_id);
    let callers_b = graph.direct_callers(&b.atom_id);
    if let [only_a] = callers_a.as_slice() {
        if let [only_b] = callers_b.as_slice() {
            if only_a.id == only_b.id {
                if let (Some(na), Some(nb)) = (name_a, name_b) {
                    if calls_in_sequence(only_a, na, nb) {
                        return TimingVerdict {
                            can_run_concurrently: false,
                            shared_entry_points: shared,
                            same_business_flow: same_flow,
                            confidence: Confidence::High,
                            details: format!(
                                "both accesses invoked in fixed sequence from `{}`",
                                only_a.id
                            ),
                        };
                    }
                }
            }
        }
    }

    // Same file under a shared caller suggests the pair belongs to one
    // sequential operation — low confidence, kept scored
    if a.file == b.file && !graph.common_callers(&a.atom_id, &b.atom_id, depth).is_empty() {
        return TimingVerdict {
            can_run_concurrently: false,
            shared_entry_points: shared,
            same_business_flow: false,
            confidence: Confidence::Low,
            details: "same-file accesses under a common caller".to_string(),
        };
    }

    // Graph too shallow to decide — report rather than stay silent
    TimingVerdict {
        can_run_concurrently: true,
        shared_entry_points: shared,
        same_business_flow: same_flow,
        confidence: Confidence::Low,
        details: "call graph could not prove an ordering".to_string(),
    }
}

/// Two accesses inside one atom: sequential unless a suspension point sits
/// between them, in which case the atom can be re-entered mid-flight.
fn same_atom_verdict(
    race: &Race,
    index: &AtomIndex,
    graph: &AtomCallGraph,
    depth: usize,
) -> TimingVerdict {
    let [a, b] = &race.accesses;
    let entries: Vec<String> = graph
        .entry_points_reaching(&a.atom_id, depth)
        .iter()
        .map(|s| s.to_string())
        .collect();

    let suspended = index
        .atom(&a.atom_id)
        .is_some_and(|atom| suspension_between(&atom.code, a.line, b.line));

    if suspended {
        TimingVerdict {
            can_run_concurrently: true,
            shared_entry_points: entries,
            same_business_flow: true,
            confidence: Confidence::Medium,
            details: "suspension point between the accesses allows interleaving".to_string(),
        }
    } else {
        TimingVerdict {
            can_run_concurrently: false,
            shared_entry_points: entries,
            same_business_flow: true,
            confidence: Confidence::High,
            details: "sequential statements in one atom with no suspension point".to_string(),
        }
    }
}

/// Whether any line from the earlier access up to (excluding) the later one
/// contains a suspension point
fn suspension_between(code: &str, line_a: usize, line_b: usize) -> bool {
    let (lo, hi) = if line_a <= line_b {
        (line_a, line_b)
    } else {
        (line_b, line_a)
    };
    code.lines()
        .skip(lo.saturating_sub(1))
        .take(hi.saturating_sub(lo))
        .any(|line| suspension_re().is_match(line))
}

/// Whether a caller dispatches both callees in parallel: awaited together in
/// a `Promise.all`-style combinator, or both fired without awaiting
fn caller_fans_out(caller: &Atom, name_a: &str, name_b: &str, index: &AtomIndex) -> bool {
    if caller.code.is_empty() {
        return false;
    }

    if promise_fanout_re().is_match(&caller.code)
        && mentions(&caller.code, name_a)
        && mentions(&caller.code, name_b)
    {
        return true;
    }

    let async_callee = |name: &str| {
        index
            .atoms_named(name)
            .iter()
            .any(|atom| atom.is_async)
    };
    fire_and_forget(&caller.code, name_a)
        && fire_and_forget(&caller.code, name_b)
        && async_callee(name_a)
        && async_callee(name_b)
}

/// Whether the caller's ordered call list names both callees (a fixed,
/// non-parallel sequence)
fn calls_in_sequence(caller: &Atom, name_a: &str, name_b: &str) -> bool {
    caller.calls.iter().any(|c| c == name_a || c.ends_with(name_a))
        && caller.calls.iter().any(|c| c == name_b || c.ends_with(name_b))
}

/// Whether the code calls `name(...)` without ever awaiting it
fn fire_and_forget(code: &str, name: &str) -> bool {
    let called = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name)))
        .map(|re| re.is_match(code))
        .unwrap_or(false);
    let awaited = Regex::new(&format!(r"await\s+{}\s*\(", regex::escape(name)))
        .map(|re| re.is_match(code))
        .unwrap_or(false);
    called && !awaited
}

/// Word-boundary containment check for an atom name inside source text
fn mentions(code: &str, name: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(name)))
        .map(|re| re.is_match(code))
        .unwrap_or(false)
}

/// Which lifecycle phase a hook name belongs to, if any
fn lifecycle_phase(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if SHUTDOWN_HOOKS.iter().any(|k| lower.contains(k)) {
        return Some("shutdown");
    }
    if STARTUP_HOOKS.iter().any(|k| lower.contains(k)) {
        return Some("startup");
    }
    None
}

fn join_entries(entries: &BTreeSet<&str>) -> String {
    entries.iter().copied().collect::<Vec<_>>().join(", ")
}

//! Built-in race matcher predicates
//!
//! Each matcher is a small pure function over an unordered access pair so it
//! can be unit-tested without the registry or the rest of the pipeline. The
//! registry tries them most specific first; [`is_conflicting`] gates the walk
//! so non-conflicting pairs (two reads) are never classified at all.

use crate::race::{AccessKind, SharedStateAccess, StateCategory};
use regex::Regex;
use std::sync::OnceLock;

fn counter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+\+|--|\+=\s*1\b|-=\s*1\b").unwrap())
}

fn array_mutation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.(?:push|pop|shift|unshift|splice|sort|reverse|fill)\s*\(").unwrap()
    })
}

fn is_write(a: &SharedStateAccess) -> bool {
    matches!(a.access_type, AccessKind::Write | AccessKind::Init)
}

/// Whether an unordered pair structurally conflicts at all.
///
/// At least one side must write (or lazily initialize), or both sides must
/// register event handlers. Read/read and read/event pairs are never races.
pub fn is_conflicting(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    is_write(a)
        || is_write(b)
        || (a.access_type == AccessKind::EventHandle && b.access_type == AccessKind::EventHandle)
}

/// Two plain writes to the same key
pub fn write_write(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    a.access_type == AccessKind::Write && b.access_type == AccessKind::Write
}

/// A read paired with a write or lazy initialization
pub fn read_write(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    (a.access_type == AccessKind::Read && is_write(b))
        || (b.access_type == AccessKind::Read && is_write(a))
}

/// Two competing lazy initializations of the same key
pub fn init_race(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    a.access_type == AccessKind::Init && b.access_type == AccessKind::Init
}

/// Two handlers registered for the same emitter/event
pub fn event_handler_conflict(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    a.access_type == AccessKind::EventHandle && b.access_type == AccessKind::EventHandle
}

/// Unguarded increment/decrement on both sides — the classic lost update
pub fn counter_increment(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    write_write(a, b) && counter_re().is_match(&a.code) && counter_re().is_match(&b.code)
}

/// In-place array mutation on at least one side of a double write
pub fn array_mutation(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    write_write(a, b)
        && (array_mutation_re().is_match(&a.code) || array_mutation_re().is_match(&b.code))
}

/// Conflicting accesses to a cache entry
pub fn cache_race(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    StateCategory::from_state_key(&a.state_key) == StateCategory::Cache
        && (is_write(a) || is_write(b))
}

/// Conflicting accesses to a database entity, at least one writing
pub fn database_update(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    StateCategory::from_state_key(&a.state_key) == StateCategory::Database
        && (is_write(a) || is_write(b))
}

/// Two writes to the same filesystem target
pub fn file_write(a: &SharedStateAccess, b: &SharedStateAccess) -> bool {
    StateCategory::from_state_key(&a.state_key) == StateCategory::Filesystem
        && a.access_type == AccessKind::Write
        && b.access_type == AccessKind::Write
}

//! Integration tests for race classification over collected accesses

use racewatch_core::collector::{collect_atom, merge_accesses};
use racewatch_core::pattern::classify_accesses;
use racewatch_core::{
    Atom, AtomIndex, MitigationKind, PatternRegistry, Project, ProjectModule, Race, RacePattern,
    SharedStateAccess, SourceFile, Severity,
};
use std::collections::BTreeMap;

fn atom(id: &str, name: &str, code: &str) -> Atom {
    Atom {
        id: id.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        ..Default::default()
    }
}

fn project(files: Vec<(&str, Vec<Atom>)>) -> Project {
    Project {
        modules: vec![ProjectModule {
            name: "app".to_string(),
            files: files
                .into_iter()
                .map(|(path, atoms)| SourceFile {
                    file_path: path.to_string(),
                    atoms,
                })
                .collect(),
        }],
        business_flows: vec![],
    }
}

fn collect(project: &Project) -> BTreeMap<String, Vec<SharedStateAccess>> {
    let index = AtomIndex::build(project);
    let per_atom: Vec<Vec<SharedStateAccess>> = index
        .atoms()
        .iter()
        .map(|a| collect_atom(a, index.file_of(&a.id), index.module_of(&a.id)))
        .collect();
    merge_accesses(per_atom)
}

/// Races whose two accesses live in different atoms
fn cross_atom(races: Vec<Race>) -> Vec<Race> {
    races
        .into_iter()
        .filter(|r| r.accesses[0].atom_id != r.accesses[1].atom_id)
        .collect()
}

// ── Built-in classification ─────────────────────────────────────

#[test]
fn test_counter_pair_classifies_as_counter_increment() {
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:inc", "inc", "counter++;\n")]),
        ("src/b.js", vec![atom("src/b.js:bump", "bump", "counter += 1;\n")]),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 1, "got: {races:?}");
    assert_eq!(races[0].race_type, "counter-increment");
}

#[test]
fn test_plain_assignments_classify_as_write_write() {
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:f", "f", "sessionState = build();\n")]),
        ("src/b.js", vec![atom("src/b.js:g", "g", "sessionState = null;\n")]),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].race_type, "write-write");
}

#[test]
fn test_lazy_singletons_classify_as_init_race() {
    let code = "if (!instance) {\n  instance = createInstance();\n}\nreturn instance;\n";
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:getA", "getA", code)]),
        ("src/b.js", vec![atom("src/b.js:getB", "getB", code)]),
    ]);

    // The guard-line reads also pair with the writes; the init-race
    // classification must win as the most specific for the atom pair
    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 1, "got: {races:?}");
    assert_eq!(races[0].race_type, "init-race");
}

#[test]
fn test_event_registrations_classify_as_handler_conflict() {
    let p = project(vec![
        (
            "src/a.js",
            vec![atom("src/a.js:f", "f", "bus.on('order', handleA);\n")],
        ),
        (
            "src/b.js",
            vec![atom("src/b.js:g", "g", "bus.on('order', handleB);\n")],
        ),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].race_type, "event-handler-conflict");
}

#[test]
fn test_database_writes_classify_as_database_update() {
    let p = project(vec![
        (
            "src/a.js",
            vec![atom(
                "src/a.js:f",
                "f",
                "db.query('UPDATE orders SET total = 1');\n",
            )],
        ),
        (
            "src/b.js",
            vec![atom(
                "src/b.js:g",
                "g",
                "db.query('UPDATE orders SET total = 2');\n",
            )],
        ),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].race_type, "database-update");
}

// ── Runtime registry mutation ───────────────────────────────────

#[test]
fn test_custom_pattern_takes_priority() {
    let mut registry = PatternRegistry::with_builtins();
    let handle = registry.register(
        RacePattern {
            type_id: "env-race".to_string(),
            name: "Environment mutation race".to_string(),
            severity: Severity::Critical,
            mitigations: vec![MitigationKind::Lock],
            priority: 1,
        },
        Box::new(|a, _| a.state_key.starts_with("global:env.")),
    );

    let p = project(vec![
        (
            "src/a.js",
            vec![atom("src/a.js:f", "f", "process.env.MODE = 'a';\n")],
        ),
        (
            "src/b.js",
            vec![atom("src/b.js:g", "g", "process.env.MODE = 'b';\n")],
        ),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &registry));
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].race_type, "env-race");
    assert_eq!(races[0].severity, Severity::Critical);

    // After unregistering, the pair falls back to the built-in type
    assert!(registry.unregister(handle));
    let races = cross_atom(classify_accesses(&collect(&p), &registry));
    assert_eq!(races[0].race_type, "write-write");
}

// ── Guarantees ──────────────────────────────────────────────────

#[test]
fn test_three_writers_produce_three_unique_races() {
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:f", "f", "total++;\n")]),
        ("src/b.js", vec![atom("src/b.js:g", "g", "total++;\n")]),
        ("src/c.js", vec![atom("src/c.js:h", "h", "total++;\n")]),
    ]);

    let races = cross_atom(classify_accesses(&collect(&p), &PatternRegistry::with_builtins()));
    assert_eq!(races.len(), 3);

    let mut ids: Vec<&str> = races.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3, "race ids must be unique per atom pair");
}

#[test]
fn test_reads_only_produce_no_races() {
    let p = project(vec![
        ("src/a.js", vec![atom("src/a.js:f", "f", "return appConfig.timeout;\n")]),
        ("src/b.js", vec![atom("src/b.js:g", "g", "return appConfig.retries;\n")]),
    ]);

    let races = classify_accesses(&collect(&p), &PatternRegistry::with_builtins());
    assert!(races.is_empty(), "got: {races:?}");
}

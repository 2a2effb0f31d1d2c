//! Integration tests for the atom call graph

use racewatch_core::{Atom, AtomCallGraph, AtomIndex, Project, ProjectModule, SourceFile};

fn atom(id: &str, name: &str, calls: &[&str]) -> Atom {
    Atom {
        id: id.to_string(),
        name: name.to_string(),
        calls: calls.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    }
}

fn exported(mut a: Atom) -> Atom {
    a.is_exported = true;
    a
}

fn project(atoms: Vec<Atom>) -> Project {
    Project {
        modules: vec![ProjectModule {
            name: "app".to_string(),
            files: vec![SourceFile {
                file_path: "src/app.js".to_string(),
                atoms,
            }],
        }],
        business_flows: vec![],
    }
}

#[test]
fn test_direct_callers_resolve_by_name() {
    let p = project(vec![
        atom("a", "alpha", &["beta"]),
        atom("b", "beta", &[]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    let callers = graph.direct_callers("b");
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].id, "a");
}

#[test]
fn test_transitive_callers_terminate_on_cycles() {
    let p = project(vec![
        atom("a", "alpha", &["beta"]),
        atom("b", "beta", &["alpha"]),
        atom("c", "gamma", &["alpha"]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    let callers = graph.transitive_callers("a", 16);
    let ids: Vec<&str> = callers.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn test_depth_bound_limits_traversal() {
    let p = project(vec![
        atom("e", "entry", &["one"]),
        atom("c1", "one", &["two"]),
        atom("c2", "two", &["three"]),
        atom("c3", "three", &["target"]),
        atom("t", "target", &[]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    let near = graph.transitive_callers("t", 2);
    let ids: Vec<&str> = near.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c3"]);

    let all = graph.transitive_callers("t", 16);
    assert_eq!(all.len(), 4);
}

#[test]
fn test_entry_point_discovery() {
    let p = project(vec![
        exported(atom("h", "handleRequest", &["work"])),
        atom("w", "work", &[]),
        atom("Comp", "Dashboard", &[]),
        atom("orphan", "leftover", &[]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    // Exported, capitalized, and caller-less atoms all count as roots
    assert!(graph.is_entry_point(index.atom("h").unwrap()));
    assert!(graph.is_entry_point(index.atom("Comp").unwrap()));
    assert!(graph.is_entry_point(index.atom("orphan").unwrap()));
    assert!(!graph.is_entry_point(index.atom("w").unwrap()));
}

#[test]
fn test_entry_points_reaching_walks_upward() {
    let p = project(vec![
        exported(atom("h1", "handleOrders", &["shared"])),
        exported(atom("h2", "handleRefunds", &["shared"])),
        atom("s", "shared", &[]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    let entries = graph.entry_points_reaching("s", 16);
    let ids: Vec<&str> = entries.into_iter().collect();
    assert_eq!(ids, vec!["h1", "h2"]);
}

#[test]
fn test_common_callers() {
    let p = project(vec![
        exported(atom("root", "Main", &["left", "right"])),
        atom("l", "left", &[]),
        atom("r", "right", &[]),
        atom("other", "unrelated", &["left"]),
    ]);
    let index = AtomIndex::build(&p);
    let graph = AtomCallGraph::build(&index);

    let common = graph.common_callers("l", "r", 16);
    let ids: Vec<&str> = common.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["root"]);
}

//! Call graph over atoms, built once per analysis run
//!
//! Nodes are atoms; edges point caller → callee and are derived from each
//! atom's `calls` list exclusively (`calledBy` is informational and never
//! trusted for ownership). Upward traversal is iterative with an explicit
//! visited set, so cyclic call graphs terminate; a configurable depth bound
//! (default 16) keeps pathological fan-in cheap.

use crate::project::{Atom, AtomIndex};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// The per-run call graph
pub struct AtomCallGraph<'a> {
    graph: DiGraph<&'a Atom, ()>,
    nodes: HashMap<&'a str, NodeIndex>,
}

impl<'a> AtomCallGraph<'a> {
    /// Build the graph from the indexed atoms.
    ///
    /// Call targets resolve first by atom id, then by name; a name shared by
    /// several atoms produces an edge to each (conservative over-approximation).
    pub fn build(index: &AtomIndex<'a>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for atom in index.atoms() {
            let node_id = graph.add_node(*atom);
            nodes.insert(atom.id.as_str(), node_id);
        }

        for atom in index.atoms() {
            let from = nodes[atom.id.as_str()];
            for call in &atom.calls {
                if let Some(target) = index.atom(call) {
                    let to = nodes[target.id.as_str()];
                    graph.update_edge(from, to, ());
                    continue;
                }
                for target in index.atoms_named(call) {
                    let to = nodes[target.id.as_str()];
                    if from != to {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }

        Self { graph, nodes }
    }

    /// Whether an atom looks like an execution root: exported, capitalized
    /// (component/handler convention), or called by nothing we can see
    pub fn is_entry_point(&self, atom: &Atom) -> bool {
        if atom.is_exported {
            return true;
        }
        if atom.name.chars().next().is_some_and(|c| c.is_uppercase()) {
            return true;
        }
        match self.nodes.get(atom.id.as_str()) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .next()
                .is_none(),
            None => true,
        }
    }

    /// Atoms that directly call the given atom
    pub fn direct_callers(&self, atom_id: &str) -> Vec<&'a Atom> {
        let Some(&node) = self.nodes.get(atom_id) else {
            return Vec::new();
        };
        let mut callers: Vec<&Atom> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        callers.sort_by(|a, b| a.id.cmp(&b.id));
        callers
    }

    /// All direct and transitive callers up to `max_depth`, the atom itself
    /// excluded. Iterative BFS with a visited set — safe on cycles.
    pub fn transitive_callers(&self, atom_id: &str, max_depth: usize) -> Vec<&'a Atom> {
        let Some(&start) = self.nodes.get(atom_id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

        queue.push_back((start, 0));
        visited.insert(start);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for caller in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(caller) {
                    result.push(self.graph[caller]);
                    queue.push_back((caller, depth + 1));
                }
            }
        }

        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Discoverable entry points from which the given atom is reachable.
    ///
    /// The atom itself counts when it is root-like. Returns a sorted set so
    /// downstream output stays deterministic.
    pub fn entry_points_reaching(&self, atom_id: &str, max_depth: usize) -> BTreeSet<&'a str> {
        let mut entries = BTreeSet::new();

        if let Some(atom) = self.nodes.get(atom_id).map(|&n| self.graph[n]) {
            if self.is_entry_point(atom) {
                entries.insert(atom.id.as_str());
            }
        }

        for caller in self.transitive_callers(atom_id, max_depth) {
            if self.is_entry_point(caller) {
                entries.insert(caller.id.as_str());
            }
        }

        entries
    }

    /// Atoms appearing in both accesses' caller chains (shared ancestry)
    pub fn common_callers(&self, atom_a: &str, atom_b: &str, max_depth: usize) -> Vec<&'a Atom> {
        let callers_a: HashSet<&str> = self
            .transitive_callers(atom_a, max_depth)
            .into_iter()
            .map(|a| a.id.as_str())
            .collect();

        self.transitive_callers(atom_b, max_depth)
            .into_iter()
            .filter(|a| callers_a.contains(a.id.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

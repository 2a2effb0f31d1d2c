//! Read-only project model handed in by the external extractor
//!
//! A [`Project`] is the unit of analysis: modules own files, files own atoms
//! (function-level units with source text and call lists). The model is never
//! mutated by the engine; every phase receives it together with an
//! [`AtomIndex`] built once per run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Error types for loading a project document
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Failed to read project file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse project document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A function-level unit extracted from source code.
///
/// Atoms missing `code` or `calls` are treated as having no detectable
/// accesses rather than causing failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    /// Unique identifier (file + name)
    pub id: String,

    /// Function name
    pub name: String,

    /// Source text of the function body
    #[serde(default)]
    pub code: String,

    /// Ordered list of callee names/targets
    #[serde(default)]
    pub calls: Vec<String>,

    /// Back-references from callers. Informational only — the call graph is
    /// built from `calls` exclusively.
    #[serde(default)]
    pub called_by: Vec<String>,

    #[serde(default)]
    pub is_async: bool,

    #[serde(default)]
    pub is_exported: bool,

    /// Containing file, if the extractor recorded it on the atom itself
    #[serde(default)]
    pub file_path: String,

    /// Containing module, if the extractor recorded it on the atom itself
    #[serde(default)]
    pub module: String,
}

/// A source file owning a list of atoms
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub file_path: String,

    #[serde(default)]
    pub atoms: Vec<Atom>,
}

/// A module owning a list of files
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectModule {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub files: Vec<SourceFile>,
}

/// One step of a business flow: a function name and its position
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub function: String,

    #[serde(default)]
    pub order: u32,
}

/// A named, ordered sequence of atoms representing one logical operation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessFlow {
    pub name: String,

    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

/// The full analysis input: modules → files → atoms, plus business flows
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub modules: Vec<ProjectModule>,

    #[serde(default)]
    pub business_flows: Vec<BusinessFlow>,
}

impl Project {
    /// Deserialize a project from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and deserialize a project document from disk
    pub fn from_json_file(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Total number of atoms across all modules and files
    pub fn atom_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| &m.files)
            .map(|f| f.atoms.len())
            .sum()
    }
}

/// Membership of an atom in one business flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowMembership<'a> {
    pub flow: &'a str,
    pub order: u32,
}

/// Lookup index over a [`Project`], built once per analysis run.
///
/// The traversal position in the project tree is authoritative for an atom's
/// file and module; the atom's own `file_path`/`module` fields are only used
/// when the tree does not provide one.
pub struct AtomIndex<'a> {
    by_id: HashMap<&'a str, &'a Atom>,
    by_name: HashMap<&'a str, Vec<&'a Atom>>,
    file_of: HashMap<&'a str, &'a str>,
    module_of: HashMap<&'a str, &'a str>,
    atoms_in_file: HashMap<&'a str, Vec<&'a Atom>>,
    flows_by_function: HashMap<&'a str, Vec<FlowMembership<'a>>>,
    all_atoms: Vec<&'a Atom>,
}

impl<'a> AtomIndex<'a> {
    /// Build the index from a project. Atoms with an empty id are skipped —
    /// they cannot be referenced by any other phase.
    pub fn build(project: &'a Project) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name: HashMap<&str, Vec<&Atom>> = HashMap::new();
        let mut file_of = HashMap::new();
        let mut module_of = HashMap::new();
        let mut atoms_in_file: HashMap<&str, Vec<&Atom>> = HashMap::new();
        let mut all_atoms = Vec::new();

        for module in &project.modules {
            for file in &module.files {
                for atom in &file.atoms {
                    if atom.id.is_empty() {
                        tracing::warn!(file = %file.file_path, "skipping atom with empty id");
                        continue;
                    }
                    by_id.insert(atom.id.as_str(), atom);
                    by_name.entry(atom.name.as_str()).or_default().push(atom);

                    let path: &str = if file.file_path.is_empty() {
                        atom.file_path.as_str()
                    } else {
                        file.file_path.as_str()
                    };
                    file_of.insert(atom.id.as_str(), path);
                    atoms_in_file.entry(path).or_default().push(atom);

                    let module_name: &str = if module.name.is_empty() {
                        atom.module.as_str()
                    } else {
                        module.name.as_str()
                    };
                    module_of.insert(atom.id.as_str(), module_name);

                    all_atoms.push(atom);
                }
            }
        }

        let mut flows_by_function: HashMap<&str, Vec<FlowMembership>> = HashMap::new();
        for flow in &project.business_flows {
            for step in &flow.steps {
                flows_by_function
                    .entry(step.function.as_str())
                    .or_default()
                    .push(FlowMembership {
                        flow: flow.name.as_str(),
                        order: step.order,
                    });
            }
        }

        Self {
            by_id,
            by_name,
            file_of,
            module_of,
            atoms_in_file,
            flows_by_function,
            all_atoms,
        }
    }

    /// Look up an atom by its unique id
    pub fn atom(&self, id: &str) -> Option<&'a Atom> {
        self.by_id.get(id).copied()
    }

    /// All atoms sharing a function name (call targets are names, not ids)
    pub fn atoms_named(&self, name: &str) -> &[&'a Atom] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// File path containing the given atom
    pub fn file_of(&self, atom_id: &str) -> &'a str {
        self.file_of.get(atom_id).copied().unwrap_or("")
    }

    /// Module name containing the given atom
    pub fn module_of(&self, atom_id: &str) -> &'a str {
        self.module_of.get(atom_id).copied().unwrap_or("")
    }

    /// Atoms declared in a file, in declaration order
    pub fn atoms_in_file(&self, path: &str) -> &[&'a Atom] {
        self.atoms_in_file
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Business flows the given function participates in
    pub fn flows_of(&self, function_name: &str) -> &[FlowMembership<'a>] {
        self.flows_by_function
            .get(function_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flows containing both functions, with each function's step order
    pub fn shared_flows(&self, a: &str, b: &str) -> Vec<(&'a str, u32, u32)> {
        let mut shared = Vec::new();
        for ma in self.flows_of(a) {
            for mb in self.flows_of(b) {
                if ma.flow == mb.flow {
                    shared.push((ma.flow, ma.order, mb.order));
                }
            }
        }
        shared
    }

    /// All indexed atoms in project declaration order
    pub fn atoms(&self) -> &[&'a Atom] {
        &self.all_atoms
    }

    /// Number of indexed atoms
    pub fn len(&self) -> usize {
        self.all_atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_atoms.is_empty()
    }
}

//! Racewatch Core - Static Race-Detection Engine
//!
//! This crate provides the analysis pipeline behind Racewatch:
//! - Shared mutable-state access collection over extracted function atoms
//! - Pattern-based race classification with a runtime-extensible registry
//! - Mitigation detection (locks, transactions, queues, immutable updates)
//! - Call-graph timing analysis and weighted risk scoring

pub mod collector;
pub mod config;
pub mod detector;
pub mod graph;
pub mod mitigation;
pub mod pattern;
pub mod project;
pub mod race;
pub mod scoring;
pub mod timing;

pub use config::{RacewatchConfig, ScoringConfig, ThresholdConfig, TimingConfig};
pub use detector::{RaceAnalysis, RaceDetector};
pub use graph::AtomCallGraph;
pub use pattern::{PatternHandle, PatternRegistry, RacePattern};
pub use project::{
    Atom, AtomIndex, BusinessFlow, FlowStep, Project, ProjectError, ProjectModule, SourceFile,
};
pub use race::{
    AccessKind, AnalysisSummary, Confidence, Mitigation, MitigationKind, Race, RiskScore,
    ScoreFactor, Severity, SharedStateAccess, StateCategory, TimingVerdict,
};
pub use scoring::{explain_race, ScoreContext};

/// Racewatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

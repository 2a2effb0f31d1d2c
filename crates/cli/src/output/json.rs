//! JSON output formatting

use racewatch_core::{AnalysisSummary, Race};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub races: Vec<Race>,
    pub summary: AnalysisSummary,
}

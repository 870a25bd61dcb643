//! Task identifier to analyzer mapping.
//!
//! New task types are added by registering a constructor in [`ANALYZERS`].

use super::race_ethnicity::{self, RaceEthnicityAnalyzer};
use super::stop_signal::{self, StopSignalAnalyzer};
use super::stop_signal_wm::{self, StopSignalWmAnalyzer};
use super::TaskAnalyzer;
use crate::error::{AnalysisError, Result};
use crate::table::TrialTable;

/// Builds an analyzer over a loaded table.
pub type AnalyzerCtor = fn(TrialTable) -> Box<dyn TaskAnalyzer>;

/// Known task identifiers and their analyzers.
pub static ANALYZERS: &[(&str, AnalyzerCtor)] = &[
    (race_ethnicity::TASK_ID, race_ethnicity_analyzer),
    (stop_signal::TASK_ID, stop_signal_analyzer),
    (stop_signal_wm::TASK_ID, stop_signal_wm_analyzer),
];

fn race_ethnicity_analyzer(table: TrialTable) -> Box<dyn TaskAnalyzer> {
    Box::new(RaceEthnicityAnalyzer::new(table))
}

fn stop_signal_analyzer(table: TrialTable) -> Box<dyn TaskAnalyzer> {
    Box::new(StopSignalAnalyzer::new(table))
}

fn stop_signal_wm_analyzer(table: TrialTable) -> Box<dyn TaskAnalyzer> {
    Box::new(StopSignalWmAnalyzer::new(table))
}

/// Find the constructor for a task identifier.
pub fn lookup_analyzer(task_id: &str) -> Result<AnalyzerCtor> {
    ANALYZERS
        .iter()
        .find(|(id, _)| *id == task_id)
        .map(|(_, ctor)| *ctor)
        .ok_or_else(|| AnalysisError::UnknownTask(task_id.to_string()))
}

/// Create the analyzer for `task_id` over `table`.
pub fn create_analyzer(task_id: &str, table: TrialTable) -> Result<Box<dyn TaskAnalyzer>> {
    lookup_analyzer(task_id).map(|ctor| ctor(table))
}

//! Stop-signal + working-memory task.
//!
//! Placeholder: no metrics are defined for this task yet. The analyzer is
//! registered so that the task's directories resolve instead of being skipped
//! as unknown, and it reports an empty record for every subject.

use super::TaskAnalyzer;
use crate::error::Result;
use crate::models::MetricsRecord;
use crate::table::{TrialSubset, TrialTable};
use tracing::debug;

pub const TASK_ID: &str = "stop_signal_wm_task";

pub struct StopSignalWmAnalyzer {
    table: TrialTable,
}

impl StopSignalWmAnalyzer {
    pub fn new(table: TrialTable) -> Self {
        Self { table }
    }
}

impl TaskAnalyzer for StopSignalWmAnalyzer {
    fn task_id(&self) -> &'static str {
        TASK_ID
    }

    fn preprocess(&self) -> Result<TrialSubset<'_>> {
        Ok(self.table.all())
    }

    // TODO: split into test_memory_trial, test_stop_trial and
    // test_memory_recognition rows once the metric definitions are settled.
    fn analyze(&self) -> Result<MetricsRecord> {
        let trials = self.preprocess()?;
        debug!("{}: {} rows, no metrics defined", TASK_ID, trials.len());
        Ok(MetricsRecord::new())
    }
}

//! Stop-signal task.
//!
//! Test trials are split into go trials (respond) and stop trials (withhold
//! the response once the stop signal appears after the stop-signal delay).
//! Accuracy and omission metrics are count ratios; reaction-time and SSD
//! metrics ignore null cells and are missing when nothing is left to
//! aggregate.

use super::{max, mean, min, ratio, TaskAnalyzer};
use crate::error::Result;
use crate::models::MetricsRecord;
use crate::table::{TrialSubset, TrialTable};

pub const TASK_ID: &str = "stop_signal";

pub struct StopSignalAnalyzer {
    table: TrialTable,
}

impl StopSignalAnalyzer {
    pub fn new(table: TrialTable) -> Self {
        Self { table }
    }
}

impl TaskAnalyzer for StopSignalAnalyzer {
    fn task_id(&self) -> &'static str {
        TASK_ID
    }

    fn preprocess(&self) -> Result<TrialSubset<'_>> {
        self.table.all().filter_eq("trial_id", "test_trial")
    }

    fn analyze(&self) -> Result<MetricsRecord> {
        let test_trials = self.preprocess()?;

        let go_trials = test_trials.filter_eq("condition", "go")?;
        let go_correct = go_trials.filter_number_eq("correct_trial", 1.0)?;
        let go_omissions = go_trials.filter_missing("rt")?;

        let stop_trials = test_trials.filter_eq("condition", "stop")?;
        let stop_correct = stop_trials.filter_number_eq("correct_trial", 1.0)?;

        let ssd = test_trials.numbers("SSD")?;

        let mut metrics = MetricsRecord::new();
        metrics.insert("go_accuracy", ratio(&go_correct, &go_trials));
        metrics.insert("go_mean_rt", mean(&go_correct.numbers("rt")?));
        metrics.insert("go_omission_rate", ratio(&go_omissions, &go_trials));
        metrics.insert("stop_accuracy", ratio(&stop_correct, &stop_trials));
        metrics.insert("stop_mean_rt", mean(&stop_trials.numbers("rt")?));
        metrics.insert("min_SSD", min(&ssd));
        metrics.insert("max_SSD", max(&ssd));
        metrics.insert("mean_SSD", mean(&ssd));
        // Last test trial in file order; rows carry no timestamp to sort by.
        metrics.insert("final_SSD", test_trials.last_number("SSD")?);

        Ok(metrics)
    }
}

//! Per-task metric computation.
//!
//! Each task in the battery has a [`TaskAnalyzer`] that selects the relevant
//! rows of the subject's raw table and turns them into a [`MetricsRecord`].
//! Analyzers are looked up by task identifier through [`factory`].

pub mod aggregator;
pub mod factory;
pub mod race_ethnicity;
pub mod stop_signal;
pub mod stop_signal_wm;
pub mod survey;

pub use aggregator::AggregationTable;
pub use factory::{create_analyzer, lookup_analyzer};

use crate::error::Result;
use crate::models::MetricsRecord;
use crate::table::TrialSubset;

/// Metric computation for one task type.
pub trait TaskAnalyzer {
    /// Task identifier this analyzer handles.
    fn task_id(&self) -> &'static str;

    /// Select the rows relevant to analysis. The loaded table is left as is.
    fn preprocess(&self) -> Result<TrialSubset<'_>>;

    /// Compute the task's metrics from the preprocessed rows.
    fn analyze(&self) -> Result<MetricsRecord>;
}

/// `numerator.len() / denominator.len()`, or `0.0` when the denominator is
/// empty.
pub fn ratio(numerator: &TrialSubset<'_>, denominator: &TrialSubset<'_>) -> f64 {
    if denominator.is_empty() {
        0.0
    } else {
        numerator.len() as f64 / denominator.len() as f64
    }
}

/// Mean of the non-null values, `None` if there are none.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Smallest non-null value.
pub fn min(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}

/// Largest non-null value.
pub fn max(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

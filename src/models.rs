//! Data models for task metrics and run results.
//!
//! This module contains the core data structures produced by the analyzers
//! and collected by the orchestrator: metric values, per-subject metric
//! records, and the summary of a full analysis run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Column holding the subject identifier in every output table.
pub const SUBJECT_COLUMN: &str = "prolific_id";

/// A single metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Numeric metric (ratios, reaction times, delays).
    Number(f64),
    /// Free-form metric (survey responses, subject ids).
    Text(String),
    /// Metric that could not be computed (e.g. mean of no trials).
    Missing,
}

impl MetricValue {
    /// Returns the numeric value, treating NaN as missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        MetricValue::Number(n)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(n: Option<f64>) -> Self {
        n.map_or(MetricValue::Missing, MetricValue::Number)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

/// Renders the value as an output table cell (empty for missing).
impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) if n.is_nan() => Ok(()),
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
            MetricValue::Missing => Ok(()),
        }
    }
}

/// Named metrics for one subject/task, in the order they were emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    entries: Vec<(String, MetricValue)>,
}

impl MetricsRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a metric, replacing an earlier value with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a metric by name.
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterates over metrics in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy of this record keyed by subject, with the subject
    /// column first.
    pub fn with_subject(&self, subject_id: &str) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push((SUBJECT_COLUMN.to_string(), MetricValue::from(subject_id)));
        entries.extend(
            self.entries
                .iter()
                .filter(|(n, _)| n != SUBJECT_COLUMN)
                .cloned(),
        );
        Self { entries }
    }

    /// The subject identifier, if attached.
    #[allow(dead_code)] // Accessor for keyed records
    pub fn subject_id(&self) -> Option<&str> {
        match self.get(SUBJECT_COLUMN) {
            Some(MetricValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// A subject/task unit that was not analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub subject_id: String,
    pub task_id: String,
    pub reason: String,
}

/// Record counts for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub records: usize,
    pub flagged: usize,
}

/// Summary of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Number of subject directories visited.
    pub subjects: usize,
    /// Number of subject/task units that produced metrics.
    pub analyzed: usize,
    /// Units skipped with a warning (unknown task, no single source file).
    pub skipped: Vec<SkippedUnit>,
    /// Units that failed with a data error.
    pub failed: Vec<SkippedUnit>,
    /// Per-task record and flag counts.
    pub tasks: BTreeMap<String, TaskCounts>,
    /// Output tables written.
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_seconds: 0.0,
            subjects: 0,
            analyzed: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            tasks: BTreeMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Total flagged records across all tasks.
    pub fn total_flagged(&self) -> usize {
        self.tasks.values().map(|c| c.flagged).sum()
    }
}

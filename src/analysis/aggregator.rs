//! Metric aggregation across subjects.
//!
//! This module collects per-subject metric records by task, keeping the
//! flagged subset alongside the full set, and derives the output column
//! layout for each task.

use crate::models::{MetricsRecord, TaskCounts};
use std::collections::BTreeMap;

/// All records for one task plus the flagged subset, in subject order.
#[derive(Debug, Clone, Default)]
pub struct TaskMetrics {
    pub all: Vec<MetricsRecord>,
    pub flagged: Vec<MetricsRecord>,
}

impl TaskMetrics {
    /// Output columns: union of metric names in first-emitted order.
    pub fn columns(&self) -> Vec<String> {
        column_union(&self.all)
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts {
            records: self.all.len(),
            flagged: self.flagged.len(),
        }
    }
}

/// Per-task collections of metric records for one run.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    tasks: BTreeMap<String, TaskMetrics>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subject's record to its task, and to the flagged subset if
    /// `flagged`.
    pub fn push(&mut self, task_id: &str, record: MetricsRecord, flagged: bool) {
        let task = self.tasks.entry(task_id.to_string()).or_default();
        if flagged {
            task.flagged.push(record.clone());
        }
        task.all.push(record);
    }

    /// Tasks with at least one record, ordered by task identifier.
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &TaskMetrics)> {
        self.tasks.iter().map(|(id, metrics)| (id.as_str(), metrics))
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total records across all tasks.
    pub fn total_records(&self) -> usize {
        self.tasks.values().map(|t| t.all.len()).sum()
    }

    pub fn counts(&self) -> BTreeMap<String, TaskCounts> {
        self.tasks
            .iter()
            .map(|(id, metrics)| (id.clone(), metrics.counts()))
            .collect()
    }
}

/// Union of metric names across records, in first-seen order.
pub fn column_union(records: &[MetricsRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for (name, _) in record.iter() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, metrics: &[(&str, f64)]) -> MetricsRecord {
        let mut record = MetricsRecord::new();
        for (name, value) in metrics {
            record.insert(*name, *value);
        }
        record.with_subject(subject)
    }

    #[test]
    fn test_push_keeps_subject_order_and_flagged_subset() {
        let mut table = AggregationTable::new();
        table.push("stop_signal", record("S1", &[("go_accuracy", 0.9)]), false);
        table.push("stop_signal", record("S2", &[("go_accuracy", 0.3)]), true);
        table.push("stop_signal", record("S3", &[("go_accuracy", 0.2)]), true);

        let (_, task) = table.tasks().next().unwrap();
        let all: Vec<_> = task.all.iter().filter_map(|r| r.subject_id()).collect();
        let flagged: Vec<_> = task.flagged.iter().filter_map(|r| r.subject_id()).collect();
        assert_eq!(all, vec!["S1", "S2", "S3"]);
        assert_eq!(flagged, vec!["S2", "S3"]);
        assert_eq!(task.counts(), TaskCounts { records: 3, flagged: 2 });
    }

    #[test]
    fn test_tasks_are_grouped() {
        let mut table = AggregationTable::new();
        assert!(table.is_empty());

        table.push("stop_signal", record("S1", &[]), false);
        table.push("stop_signal_wm_task", record("S1", &[]), false);
        table.push("stop_signal", record("S2", &[]), false);

        let ids: Vec<_> = table.tasks().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["stop_signal", "stop_signal_wm_task"]);
        assert_eq!(table.total_records(), 3);
        assert_eq!(table.counts()["stop_signal"].records, 2);
    }

    #[test]
    fn test_column_union_first_seen_order() {
        let records = vec![
            record("S1", &[("a", 1.0), ("b", 2.0)]),
            record("S2", &[("c", 3.0), ("a", 4.0)]),
        ];
        assert_eq!(column_union(&records), vec!["prolific_id", "a", "b", "c"]);
    }
}

//! Output table and run summary generation.
//!
//! This module writes the per-task metric tables and renders the run
//! summary for the console and as JSON.

use crate::analysis::aggregator::TaskMetrics;
use crate::models::{MetricsRecord, RunSummary};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Path of the full metrics table for a task.
pub fn metrics_path(analysis_dir: &Path, task_id: &str) -> PathBuf {
    analysis_dir.join(format!("{}_metrics.csv", task_id))
}

/// Path of the flagged metrics table for a task.
pub fn flagged_path(analysis_dir: &Path, task_id: &str) -> PathBuf {
    analysis_dir.join(format!("{}_metrics__flagged.csv", task_id))
}

/// Write one metrics table. Missing metrics become empty cells.
pub fn write_metrics_table<W: Write>(
    writer: W,
    columns: &[String],
    records: &[MetricsRecord],
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| record.get(column).map(ToString::to_string).unwrap_or_default())
            .collect();
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Files written for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTables {
    pub all: PathBuf,
    pub flagged: Option<PathBuf>,
}

impl TaskTables {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.all).chain(self.flagged.as_ref())
    }
}

/// Write a task's full table and, if any subject was flagged, its flagged
/// table with the same columns.
pub fn write_task_tables(
    analysis_dir: &Path,
    task_id: &str,
    metrics: &TaskMetrics,
) -> Result<TaskTables> {
    let columns = metrics.columns();

    let all = metrics_path(analysis_dir, task_id);
    write_table_file(&all, &columns, &metrics.all)?;

    let flagged = if metrics.flagged.is_empty() {
        None
    } else {
        let path = flagged_path(analysis_dir, task_id);
        write_table_file(&path, &columns, &metrics.flagged)?;
        Some(path)
    };

    Ok(TaskTables { all, flagged })
}

fn write_table_file(path: &Path, columns: &[String], records: &[MetricsRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_metrics_table(file, columns, records)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Generate a text summary of a run.
pub fn generate_summary_text(summary: &RunSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Subjects: {}", summary.subjects));
    lines.push(format!("Analyzed: {}", summary.analyzed));
    lines.push(format!("Skipped: {}", summary.skipped.len()));
    lines.push(format!("Failed: {}", summary.failed.len()));

    if !summary.tasks.is_empty() {
        lines.push(String::new());
        lines.push("By Task:".to_string());
        for (task_id, counts) in &summary.tasks {
            lines.push(format!(
                "- {}: {} records, {} flagged",
                task_id, counts.records, counts.flagged
            ));
        }
    }

    if !summary.failed.is_empty() {
        lines.push(String::new());
        lines.push("Failures:".to_string());
        for unit in &summary.failed {
            lines.push(format!(
                "- {}/{}: {}",
                unit.subject_id, unit.task_id, unit.reason
            ));
        }
    }

    lines.join("\n")
}

/// Generate the JSON form of a run summary.
pub fn generate_json_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write the JSON run summary to a file.
pub fn write_json_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let content = generate_json_summary(summary)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricValue, SkippedUnit, TaskCounts};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(subject: &str, metrics: &[(&str, MetricValue)]) -> MetricsRecord {
        let mut record = MetricsRecord::new();
        for (name, value) in metrics {
            record.insert(*name, value.clone());
        }
        record.with_subject(subject)
    }

    #[test]
    fn test_write_metrics_table() {
        let records = vec![
            record("S1", &[("race", "White".into()), ("latino", "No".into())]),
            record("S2", &[("race", "Asian, White".into()), ("race_other", MetricValue::Missing)]),
        ];
        let columns = crate::analysis::aggregator::column_union(&records);

        let mut out = Vec::new();
        write_metrics_table(&mut out, &columns, &records).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "prolific_id,race,latino,race_other\nS1,White,No,\nS2,\"Asian, White\",,\n"
        );
    }

    #[test]
    fn test_flagged_table_only_when_flagged() {
        let dir = TempDir::new().unwrap();
        let mut metrics = TaskMetrics::default();
        metrics
            .all
            .push(record("S1", &[("go_accuracy", 0.9.into())]));

        let written = write_task_tables(dir.path(), "stop_signal", &metrics).unwrap();
        assert_eq!(
            written,
            TaskTables {
                all: dir.path().join("stop_signal_metrics.csv"),
                flagged: None
            }
        );
        assert!(!flagged_path(dir.path(), "stop_signal").exists());

        let low = record("S2", &[("go_accuracy", 0.3.into()), ("extra", 1.0.into())]);
        metrics.all.push(low.clone());
        metrics.flagged.push(low);

        let written = write_task_tables(dir.path(), "stop_signal", &metrics).unwrap();
        assert_eq!(written.paths().count(), 2);

        let flagged = std::fs::read_to_string(written.flagged.unwrap()).unwrap();
        assert_eq!(flagged, "prolific_id,go_accuracy,extra\nS2,0.3,1\n");
    }

    #[test]
    fn test_summary_text_and_json() {
        let mut summary = RunSummary::new(Utc::now());
        summary.subjects = 2;
        summary.analyzed = 3;
        summary.tasks.insert(
            "stop_signal".to_string(),
            TaskCounts {
                records: 2,
                flagged: 1,
            },
        );
        summary.failed.push(SkippedUnit {
            subject_id: "S2".to_string(),
            task_id: "race_ethnicity_RMR_survey_rdoc".to_string(),
            reason: "Expected 1 survey row, got 0".to_string(),
        });

        let text = generate_summary_text(&summary);
        assert!(text.contains("- stop_signal: 2 records, 1 flagged"));
        assert!(text.contains("S2/race_ethnicity_RMR_survey_rdoc: Expected 1 survey row"));

        let json = generate_json_summary(&summary).unwrap();
        assert!(json.contains("\"started_at\""));
        assert!(json.contains("\"flagged\": 1"));
    }
}

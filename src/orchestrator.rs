//! Batch analysis over the preprocessed data tree.
//!
//! Every subject/task unit is analyzed independently: a unit that cannot be
//! analyzed is logged and recorded in the run summary, and the run moves on.
//! Output tables are written once, after every unit has been processed.

use crate::analysis::{create_analyzer, lookup_analyzer, AggregationTable};
use crate::config::AnalysisSettings;
use crate::error::AnalysisError;
use crate::models::{MetricsRecord, RunSummary, SkippedUnit};
use crate::report;
use crate::scanner::{self, WorkUnit};
use crate::table::TrialTable;
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Analyze every subject/task unit and write the per-task tables.
///
/// Only failures to scan the input root or to write an output table are
/// returned as errors.
pub fn run_analysis(settings: &AnalysisSettings) -> Result<RunSummary> {
    let start_time = Instant::now();
    let mut summary = RunSummary::new(Utc::now());

    info!("Calculating metrics...");
    let scan = scanner::discover_units(&settings.preprocessed_data_dir)?;
    summary.subjects = scan.subjects;
    summary.skipped.extend(scan.unreadable.iter().cloned());

    let progress = progress_bar(scan.units.len() as u64, settings.show_progress);
    let mut aggregated = AggregationTable::new();

    for unit in &scan.units {
        progress.set_message(format!("{}/{}", unit.subject_id, unit.task_id));

        match analyze_unit(unit) {
            Ok(metrics) => {
                let record = metrics.with_subject(&unit.subject_id);
                let flagged = settings.flags.is_flagged(&record, &unit.task_id);
                if flagged {
                    let details: Vec<String> = settings
                        .flags
                        .violations(&record, &unit.task_id)
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    info!(
                        "Flagged {}/{}: {}",
                        unit.subject_id,
                        unit.task_id,
                        details.join(", ")
                    );
                }
                aggregated.push(&unit.task_id, record, flagged);
                summary.analyzed += 1;
            }
            Err(e) if e.is_skip() => {
                warn!("Skipping {}/{}: {}", unit.subject_id, unit.task_id, e);
                summary.skipped.push(skipped(unit, &e));
            }
            Err(e) => {
                error!(
                    "Error analyzing {}/{} ({}): {}",
                    unit.subject_id,
                    unit.task_id,
                    unit.dir.display(),
                    e
                );
                summary.failed.push(skipped(unit, &e));
            }
        }

        progress.inc(1);
    }
    progress.finish_and_clear();

    summary.tasks = aggregated.counts();

    if aggregated.is_empty() {
        warn!("No metrics collected");
    } else {
        std::fs::create_dir_all(&settings.analysis_dir).with_context(|| {
            format!(
                "Failed to create analysis directory {}",
                settings.analysis_dir.display()
            )
        })?;

        for (task_id, metrics) in aggregated.tasks() {
            let written = report::write_task_tables(&settings.analysis_dir, task_id, metrics)?;
            info!(
                "Saved {} {} metrics to {}",
                metrics.all.len(),
                task_id,
                written.all.display()
            );
            if let Some(ref flagged_path) = written.flagged {
                info!(
                    "Saved {} flagged {} metrics to {}",
                    metrics.flagged.len(),
                    task_id,
                    flagged_path.display()
                );
            }
            summary.outputs.extend(written.paths().cloned());
        }
    }

    summary.duration_seconds = start_time.elapsed().as_secs_f64();
    info!(
        "Done! {} records across {} tasks ({} flagged, {} skipped, {} failed)",
        aggregated.total_records(),
        summary.tasks.len(),
        summary.total_flagged(),
        summary.skipped.len(),
        summary.failed.len()
    );

    Ok(summary)
}

/// Load one unit's table and compute its metrics.
fn analyze_unit(unit: &WorkUnit) -> std::result::Result<MetricsRecord, AnalysisError> {
    let source = scanner::resolve_source(&unit.dir)?;
    // Unknown tasks are skipped before their file is read.
    lookup_analyzer(&unit.task_id)?;

    let table = TrialTable::from_path(&source)?;
    if table.is_empty() {
        warn!("{} has a header but no rows", source.display());
    } else {
        debug!("Loaded {} rows from {}", table.len(), source.display());
    }

    let analyzer = create_analyzer(&unit.task_id, table)?;
    let metrics = analyzer.analyze()?;
    if metrics.is_empty() {
        debug!("{} defines no metrics", analyzer.task_id());
    }
    debug!(
        "{} analyzer produced {} metrics for {}",
        analyzer.task_id(),
        metrics.len(),
        unit.subject_id
    );
    Ok(metrics)
}

fn skipped(unit: &WorkUnit, error: &AnalysisError) -> SkippedUnit {
    SkippedUnit {
        subject_id: unit.subject_id.clone(),
        task_id: unit.task_id.clone(),
        reason: error.to_string(),
    }
}

fn progress_bar(len: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

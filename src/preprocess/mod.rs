//! Raw export to per-subject/per-task CSV conversion.
//!
//! The experiment server exports one `unified.csv` index plus one JSON
//! document per session under `<raw_data_dir>/results_export/`. Each session
//! of the configured study collection is written as
//! `<preprocessed_dir>/<prolific_id>/<exp_name>/sub-<id>_task-<exp>_date-<dt>.csv`,
//! one row per trial.

use crate::literal;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Export subdirectory holding the index and session documents.
pub const EXPORT_DIR: &str = "results_export";

/// Session index file inside [`EXPORT_DIR`].
pub const UNIFIED_FILE: &str = "unified.csv";

/// One row of `unified.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnifiedRow {
    pub subject: String,
    pub battery_id: String,
    #[serde(deserialize_with = "collection_id")]
    pub study_collection_id: i64,
    pub fname: String,
    pub exp_name: String,
}

/// Top-level fields of a session document.
#[derive(Debug, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    trialdata: Option<Value>,
    #[serde(default, rename = "dateTime")]
    date_time: Option<Value>,
    #[serde(default)]
    prolific_id: Option<String>,
}

/// One participant session for one experiment.
#[derive(Debug, Clone)]
pub struct ExperimentSession {
    pub subject: String,
    pub fname: String,
    pub exp_name: String,
    pub date_time: Option<String>,
    pub prolific_id: Option<String>,
    pub trials: Vec<Map<String, Value>>,
}

/// Counts for one preprocessing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub sessions: usize,
    pub written: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Read `unified.csv` and keep the rows of one study collection.
pub fn load_unified(raw_data_dir: &Path, study_collection_id: i64) -> Result<Vec<UnifiedRow>> {
    let path = raw_data_dir.join(EXPORT_DIR).join(UNIFIED_FILE);
    if !path.exists() {
        bail!("Unified CSV file not found at {}", path.display());
    }

    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<UnifiedRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping row {} of {}: {}", i + 1, path.display(), e);
                continue;
            }
        };
        if row.study_collection_id == study_collection_id {
            rows.push(row);
        }
    }

    debug!(
        "{} sessions in study collection {}",
        rows.len(),
        study_collection_id
    );
    Ok(rows)
}

/// Collection ids may be written as floats (`68.0`) by tools that store the
/// column as floating point.
fn collection_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(id);
    }
    match raw.parse::<f64>() {
        Ok(id) if id.fract() == 0.0 && id.abs() < i64::MAX as f64 => Ok(id as i64),
        _ => Err(serde::de::Error::custom(format!(
            "invalid study_collection_id {:?}",
            raw
        ))),
    }
}

impl ExperimentSession {
    /// Load the session document referenced by a `unified.csv` row.
    pub fn from_row(row: &UnifiedRow, raw_data_dir: &Path) -> Result<Self> {
        let path = raw_data_dir.join(EXPORT_DIR).join(&row.fname);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let document: SessionDocument = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Self {
            subject: row.subject.clone(),
            fname: row.fname.clone(),
            exp_name: row.exp_name.clone(),
            date_time: document.date_time.as_ref().map(plain_text),
            prolific_id: document.prolific_id,
            trials: parse_trialdata(document.trialdata)?,
        })
    }

    /// Where this session's CSV goes under `base_dir`.
    pub fn output_path(&self, base_dir: &Path) -> Result<PathBuf> {
        let prolific_id = self
            .prolific_id
            .as_deref()
            .ok_or_else(|| anyhow!("No prolific_id in {}", self.fname))?;
        let prolific_id = path_segment("prolific_id", prolific_id)?;
        let exp_name = path_segment("exp_name", &self.exp_name)?;
        let date = path_segment("dateTime", self.date_time.as_deref().unwrap_or("unknown"))?;

        Ok(base_dir
            .join(prolific_id)
            .join(exp_name)
            .join(format!(
                "sub-{}_task-{}_date-{}.csv",
                prolific_id, exp_name, date
            )))
    }

    /// Write the trials to CSV. Returns `None` if there were no trials.
    pub fn save(&self, base_dir: &Path) -> Result<Option<PathBuf>> {
        if self.trials.is_empty() {
            warn!("No trial data for {} (subject {})", self.fname, self.subject);
            return Ok(None);
        }

        let path = self.output_path(base_dir)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_trials(file, &self.trials)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved preprocessed data to {}", path.display());
        Ok(Some(path))
    }
}

/// A value used as one path component. Must stay inside its parent directory.
fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        bail!("Unsafe {} for a file name: {:?}", field, value);
    }
    Ok(value)
}

/// Convert every session of a study collection. Per-session failures are
/// logged and counted; only a missing or unreadable index is an error.
pub fn run_preprocess(
    raw_data_dir: &Path,
    preprocessed_dir: &Path,
    study_collection_id: i64,
) -> Result<PreprocessSummary> {
    info!("Converting raw session data to CSV...");
    let rows = load_unified(raw_data_dir, study_collection_id)?;

    let mut summary = PreprocessSummary::default();
    for row in &rows {
        summary.sessions += 1;
        debug!(
            "Processing {} (subject {}, battery {})",
            row.fname, row.subject, row.battery_id
        );
        let result = ExperimentSession::from_row(row, raw_data_dir)
            .and_then(|session| session.save(preprocessed_dir));

        match result {
            Ok(Some(_)) => summary.written += 1,
            Ok(None) => summary.empty += 1,
            Err(e) => {
                error!("Error processing {}: {:#}", row.fname, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Done! {} sessions: {} written, {} empty, {} failed",
        summary.sessions, summary.written, summary.empty, summary.failed
    );
    Ok(summary)
}

/// `trialdata` is either an array of trial objects or a string holding one.
fn parse_trialdata(raw: Option<Value>) -> Result<Vec<Map<String, Value>>> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(s)) => {
            serde_json::from_str::<Value>(&s).context("trialdata string is not valid JSON")?
        }
        Some(other) => other,
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(trial) => Ok(trial),
                _ => Err(anyhow!("trial {} is not an object", i)),
            })
            .collect(),
        _ => bail!("trialdata is not an array"),
    }
}

/// Write trials as CSV. Columns are the union of trial keys in first-seen
/// order; absent keys become empty cells.
pub fn write_trials<W: Write>(writer: W, trials: &[Map<String, Value>]) -> Result<()> {
    let mut columns: Vec<&str> = Vec::new();
    for trial in trials {
        for key in trial.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&columns)?;
    for trial in trials {
        let row: Vec<String> = columns
            .iter()
            .map(|column| trial.get(*column).map(cell_text).unwrap_or_default())
            .collect();
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Cell encoding: nested values use literal notation so survey answers can
/// be read back by the analyzers.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => literal::format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => literal::to_literal(value),
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => literal::to_literal(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::create_analyzer;
    use crate::models::MetricValue;
    use crate::table::TrialTable;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const UNIFIED: &str = "subject,battery_id,study_collection_id,fname,exp_name\n\
        s-1,7,68,a.json,stop_signal\n\
        s-1,7,68,b.json,race_ethnicity_RMR_survey_rdoc\n\
        s-2,8,12,c.json,stop_signal\n\
        s-3,7,68,d.json,stop_signal\n\
        s-4,7,68,missing.json,stop_signal\n";

    fn export(root: &Path) {
        let dir = root.join(EXPORT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(UNIFIED_FILE), UNIFIED).unwrap();

        let trials = json!([
            {"trial_id": "instructions", "rt": null},
            {"trial_id": "test_trial", "condition": "go", "correct_trial": 1, "rt": 512.5, "SSD": null},
            {"trial_id": "test_trial", "condition": "stop", "correct_trial": 0, "rt": 430, "SSD": 250}
        ]);
        // trialdata stored as an embedded JSON string
        let a = json!({"trialdata": trials.to_string(), "dateTime": 1700000000000_i64, "prolific_id": "P1"});
        fs::write(dir.join("a.json"), a.to_string()).unwrap();

        let b = json!({
            "trialdata": [{
                "trial_type": "survey",
                "race": {"response": ["Asian", "White"], "key": "race"},
                "race_other": {"response": "", "key": "race_other"},
                "latino": {"response": "No", "key": "latino"},
                "completed": true
            }],
            "dateTime": "2024-05-01",
            "prolific_id": "P1"
        });
        fs::write(dir.join("b.json"), b.to_string()).unwrap();

        let d = json!({"trialdata": [], "prolific_id": "P3"});
        fs::write(dir.join("d.json"), d.to_string()).unwrap();
    }

    #[test]
    fn test_load_unified_filters_collection() {
        let root = TempDir::new().unwrap();
        export(root.path());

        let rows = load_unified(root.path(), 68).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.fname.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json", "d.json", "missing.json"]);
    }

    #[test]
    fn test_bad_unified_rows_are_skipped() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(EXPORT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(UNIFIED_FILE),
            "subject,battery_id,study_collection_id,fname,exp_name\n\
             s-1,7,68,a.json,stop_signal\n\
             s-2,8,,b.json,stop_signal\n\
             s-3,7,68.0,c.json,stop_signal\n\
             s-4,7,sixty,d.json,stop_signal\n",
        )
        .unwrap();

        let rows = load_unified(root.path(), 68).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.fname.as_str()).collect();
        assert_eq!(names, vec!["a.json", "c.json"]);
    }

    #[test]
    fn test_missing_unified_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(load_unified(root.path(), 68).is_err());
    }

    #[test]
    fn test_run_preprocess_writes_sessions() {
        let root = TempDir::new().unwrap();
        export(root.path());
        let out = root.path().join("pre");

        let summary = run_preprocess(root.path(), &out, 68).unwrap();
        assert_eq!(
            summary,
            PreprocessSummary {
                sessions: 4,
                written: 2,
                empty: 1,
                failed: 1
            }
        );

        let stop = out
            .join("P1")
            .join("stop_signal")
            .join("sub-P1_task-stop_signal_date-1700000000000.csv");
        assert_eq!(
            fs::read_to_string(&stop).unwrap(),
            "trial_id,rt,condition,correct_trial,SSD\n\
             instructions,,,,\n\
             test_trial,512.5,go,1,\n\
             test_trial,430,stop,0,250\n"
        );
    }

    #[test]
    fn test_preprocessed_survey_reads_back() {
        let root = TempDir::new().unwrap();
        export(root.path());
        let out = root.path().join("pre");
        run_preprocess(root.path(), &out, 68).unwrap();

        let path = out
            .join("P1")
            .join("race_ethnicity_RMR_survey_rdoc")
            .join("sub-P1_task-race_ethnicity_RMR_survey_rdoc_date-2024-05-01.csv");
        let table = TrialTable::from_path(&path).unwrap();
        let metrics = create_analyzer("race_ethnicity_RMR_survey_rdoc", table)
            .ok()
            .unwrap()
            .analyze()
            .unwrap();

        assert_eq!(
            metrics.get("race"),
            Some(&MetricValue::from("['Asian', 'White']"))
        );
        assert_eq!(metrics.get("latino"), Some(&MetricValue::from("No")));
    }

    #[test]
    fn test_output_path_requires_prolific_id() {
        let session = ExperimentSession {
            subject: "s-1".to_string(),
            fname: "a.json".to_string(),
            exp_name: "stop_signal".to_string(),
            date_time: None,
            prolific_id: None,
            trials: Vec::new(),
        };
        assert!(session.output_path(Path::new("pre")).is_err());
    }

    #[test]
    fn test_output_path_stays_inside_base_dir() {
        let session = |prolific_id: &str, exp_name: &str| ExperimentSession {
            subject: "s-1".to_string(),
            fname: "a.json".to_string(),
            exp_name: exp_name.to_string(),
            date_time: Some("2024-05-01".to_string()),
            prolific_id: Some(prolific_id.to_string()),
            trials: Vec::new(),
        };
        let base = Path::new("pre");

        assert_eq!(
            session("P1", "stop_signal").output_path(base).unwrap(),
            base.join("P1/stop_signal/sub-P1_task-stop_signal_date-2024-05-01.csv")
        );
        assert!(session("..", "stop_signal").output_path(base).is_err());
        assert!(session("/etc", "stop_signal").output_path(base).is_err());
        assert!(session("P1", "../../escape").output_path(base).is_err());
        assert!(session("P1", "a\\b").output_path(base).is_err());
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!(true)), "True");
        assert_eq!(cell_text(&json!(1)), "1");
        assert_eq!(cell_text(&json!(2.0)), "2.0");
        assert_eq!(cell_text(&json!("go")), "go");
        assert_eq!(
            cell_text(&json!({"response": "No", "key": "latino"})),
            "{'response': 'No', 'key': 'latino'}"
        );
    }

    #[test]
    fn test_trialdata_shapes() {
        assert!(parse_trialdata(None).unwrap().is_empty());
        assert!(parse_trialdata(Some(json!(""))).unwrap().is_empty());
        assert_eq!(parse_trialdata(Some(json!("[{\"a\": 1}]"))).unwrap().len(), 1);
        assert!(parse_trialdata(Some(json!({"a": 1}))).is_err());
        assert!(parse_trialdata(Some(json!([1, 2]))).is_err());
        assert!(parse_trialdata(Some(json!("not json"))).is_err());
    }
}

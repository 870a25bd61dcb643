//! Race/ethnicity self-report survey.

use super::survey::parse_survey_response;
use super::TaskAnalyzer;
use crate::error::{AnalysisError, Result};
use crate::models::MetricsRecord;
use crate::table::{TrialSubset, TrialTable};

pub const TASK_ID: &str = "race_ethnicity_RMR_survey_rdoc";

/// Survey fields reported as metrics, keyed by their parsed `key`.
const SURVEY_FIELDS: [&str; 3] = ["race", "race_other", "latino"];

/// Extracts the survey answers from the single survey submission row.
pub struct RaceEthnicityAnalyzer {
    table: TrialTable,
}

impl RaceEthnicityAnalyzer {
    pub fn new(table: TrialTable) -> Self {
        Self { table }
    }
}

impl TaskAnalyzer for RaceEthnicityAnalyzer {
    fn task_id(&self) -> &'static str {
        TASK_ID
    }

    fn preprocess(&self) -> Result<TrialSubset<'_>> {
        self.table.all().filter_eq("trial_type", "survey")
    }

    fn analyze(&self) -> Result<MetricsRecord> {
        let survey = self.preprocess()?;
        if survey.len() != 1 {
            return Err(AnalysisError::StructuralViolation(format!(
                "Expected 1 survey row, got {}",
                survey.len()
            )));
        }

        let mut metrics = MetricsRecord::new();
        for field in SURVEY_FIELDS {
            let (response, key) = parse_survey_response(survey.text(0, field)?)?;
            metrics.insert(key, response);
        }

        Ok(metrics)
    }
}

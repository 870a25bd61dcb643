//! Survey answer parsing.

use crate::error::{AnalysisError, Result};
use crate::literal;
use crate::models::MetricValue;
use serde_json::Value;

/// Parse a stored survey answer such as `{'response': 'White', 'key': 'race'}`
/// into `(response, key)`.
///
/// Fails if the value is absent, is not a well-formed literal, or lacks either
/// entry. The key must be a string; the response may be any literal and is
/// converted to a metric value (lists are kept in literal form).
pub fn parse_survey_response(value: Option<&str>) -> Result<(MetricValue, String)> {
    let raw = value.ok_or_else(|| {
        AnalysisError::SurveyResponse("survey response value is missing".to_string())
    })?;

    let parsed = literal::parse(raw)?;
    let Value::Object(mut entries) = parsed else {
        return Err(AnalysisError::SurveyResponse(format!(
            "expected a mapping, got {}",
            raw
        )));
    };

    let key = match entries.remove("key") {
        Some(Value::String(key)) => key,
        Some(other) => {
            return Err(AnalysisError::SurveyResponse(format!(
                "'key' must be a string, got {}",
                literal::to_literal(&other)
            )))
        }
        None => {
            return Err(AnalysisError::SurveyResponse(format!(
                "no 'key' entry in {}",
                raw
            )))
        }
    };

    let response = entries.remove("response").ok_or_else(|| {
        AnalysisError::SurveyResponse(format!("no 'response' entry in {}", raw))
    })?;

    Ok((response_value(response), key))
}

fn response_value(value: Value) -> MetricValue {
    match value {
        Value::Null => MetricValue::Missing,
        Value::String(s) => MetricValue::Text(s),
        Value::Number(n) => n.as_f64().map_or(MetricValue::Missing, MetricValue::Number),
        other => MetricValue::Text(literal::to_literal(&other)),
    }
}

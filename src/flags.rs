//! Quality-control flagging.
//!
//! A subject is flagged for a task when any metric with a configured range
//! falls outside it. Ranges come from the `[flags]` section of the
//! configuration file; tasks without an entry are never flagged.

use crate::models::MetricsRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Acceptable range for one metric. Either bound may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RangeRule {
    pub fn min(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn max(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// The bound `value` violates, if any. Every configured bound is checked.
    pub fn check(&self, value: f64) -> Option<Bound> {
        if let Some(min) = self.min {
            if value < min {
                return Some(Bound::Min(min));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(Bound::Max(max));
            }
        }
        None
    }
}

/// A violated bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Min(f64),
    Max(f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Min(min) => write!(f, "below min {}", min),
            Bound::Max(max) => write!(f, "above max {}", max),
        }
    }
}

/// One metric outside its range.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub metric: String,
    pub value: f64,
    pub bound: Bound,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} {}", self.metric, self.value, self.bound)
    }
}

/// Range rules by task identifier, then metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagCriteria {
    tasks: BTreeMap<String, BTreeMap<String, RangeRule>>,
}

impl FlagCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule for `metric` within `task_id`.
    pub fn with_rule(mut self, task_id: &str, metric: &str, rule: RangeRule) -> Self {
        self.tasks
            .entry(task_id.to_string())
            .or_default()
            .insert(metric.to_string(), rule);
        self
    }

    /// Register a task that is never flagged.
    pub fn with_task(mut self, task_id: &str) -> Self {
        self.tasks.entry(task_id.to_string()).or_default();
        self
    }

    /// Rules for a task, if any are configured.
    pub fn rules(&self, task_id: &str) -> Option<&BTreeMap<String, RangeRule>> {
        self.tasks.get(task_id)
    }

    /// Every configured metric of `task_id` that `record` violates.
    ///
    /// Metrics absent from the record, null/NaN values and text values are
    /// never checked.
    pub fn violations(&self, record: &MetricsRecord, task_id: &str) -> Vec<Violation> {
        let Some(rules) = self.rules(task_id) else {
            return Vec::new();
        };

        rules
            .iter()
            .filter_map(|(metric, rule)| {
                let value = record.get(metric)?.as_number()?;
                rule.check(value).map(|bound| Violation {
                    metric: metric.clone(),
                    value,
                    bound,
                })
            })
            .collect()
    }

    /// Whether `record` violates any configured range for `task_id`.
    pub fn is_flagged(&self, record: &MetricsRecord, task_id: &str) -> bool {
        !self.violations(record, task_id).is_empty()
    }
}

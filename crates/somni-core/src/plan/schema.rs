//! Plan output schema and validation of raw model text.
//!
//! The prompt describes the expected shape to the model, but that
//! description is advisory. This module is the enforcement: raw text is
//! parsed as JSON, deserialized into [`PlanOutput`] with strict types (no
//! number/string coercion), and every schedule time is checked for the
//! 24-hour `HH:MM` format. Invalid output is rejected, never repaired.
//!
//! Fields outside the schema are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A validated daily routine plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub plan_type: String,
    pub title: String,
    pub summary: String,
    pub schedule: Schedule,
    pub objectives: Vec<String>,
    pub recommendations: Vec<String>,
    pub window: PlanWindow,
    pub metrics: PlanMetrics,
    pub metadata: PlanMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub bedtime: String,
    pub wake_time: String,
    pub meals: Vec<Meal>,
    pub activities: Vec<Activity>,
    pub naps: Vec<Nap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub time: String,
    #[serde(rename = "type")]
    pub meal_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub time: String,
    pub activity: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nap {
    pub time: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWindow {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetrics {
    pub event_count: u64,
    pub distinct_types: u64,
    pub by_type: BTreeMap<String, u64>,
    /// Required key; `null` when the age is unknown (survey-only plans).
    #[serde(deserialize_with = "nullable")]
    pub age_in_months: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub rag_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Deserialize a field that must be present but may be `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Why a raw model response was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("output is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("model reported insufficient data")]
    Declined { reason: Option<String> },

    #[error("output does not match the plan schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("{field} is not a 24-hour HH:MM time")]
    InvalidTime { field: String },
}

impl ValidationError {
    /// Fixed label for logs and metrics. Never contains model text.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Declined { .. } => "declined",
            Self::Schema(_) => "schema",
            Self::InvalidTime { .. } => "time_format",
        }
    }
}

/// Parse and validate raw model output.
pub fn validate_output(raw: &str) -> Result<PlanOutput, ValidationError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(ValidationError::Parse)?;

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        if error == "insufficient_data" {
            let reason = value
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_owned);
            return Err(ValidationError::Declined { reason });
        }
    }

    let plan: PlanOutput = serde_json::from_value(value).map_err(ValidationError::Schema)?;
    check_times(&plan)?;
    Ok(plan)
}

fn check_times(plan: &PlanOutput) -> Result<(), ValidationError> {
    let schedule = &plan.schedule;
    let mut times: Vec<(String, &str)> = vec![
        ("schedule.bedtime".to_owned(), schedule.bedtime.as_str()),
        ("schedule.wakeTime".to_owned(), schedule.wake_time.as_str()),
    ];
    times.extend(
        schedule
            .meals
            .iter()
            .enumerate()
            .map(|(i, m)| (format!("schedule.meals[{i}].time"), m.time.as_str())),
    );
    times.extend(
        schedule
            .activities
            .iter()
            .enumerate()
            .map(|(i, a)| (format!("schedule.activities[{i}].time"), a.time.as_str())),
    );
    times.extend(
        schedule
            .naps
            .iter()
            .enumerate()
            .map(|(i, n)| (format!("schedule.naps[{i}].time"), n.time.as_str())),
    );

    match times.into_iter().find(|(_, t)| !is_hh_mm(t)) {
        Some((field, _)) => Err(ValidationError::InvalidTime { field }),
        None => Ok(()),
    }
}

/// Strict 24-hour `HH:MM` with zero padding.
pub fn is_hh_mm(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return false;
    }
    let digits = [b[0], b[1], b[3], b[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (b[0] - b'0') * 10 + (b[1] - b'0');
    let minutes = (b[3] - b'0') * 10 + (b[4] - b'0');
    hours < 24 && minutes < 60
}

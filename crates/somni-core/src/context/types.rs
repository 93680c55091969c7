//! Data carried from the collaborators into the prompt.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EventWindow
// ---------------------------------------------------------------------------

/// Errors from constructing an [`EventWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window start {from} is not before window end {to}")]
    Inverted {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("window of {lookback} ending at {to} starts before the earliest representable time")]
    Overflow {
        to: DateTime<Utc>,
        lookback: chrono::Duration,
    },
}

/// The half-open `[from, to)` range over which events are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl EventWindow {
    /// Build a window, rejecting empty or inverted ranges.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, WindowError> {
        if from >= to {
            return Err(WindowError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    /// The window of length `lookback` that ends at `to`.
    pub fn ending_at(to: DateTime<Utc>, lookback: chrono::Duration) -> Result<Self, WindowError> {
        let from = to
            .checked_sub_signed(lookback)
            .ok_or(WindowError::Overflow { to, lookback })?;
        Self::new(from, to)
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }
}

// ---------------------------------------------------------------------------
// EventTypeCounts
// ---------------------------------------------------------------------------

/// Number of events per event-type label. Keys are unique and ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTypeCounts(BTreeMap<String, u64>);

impl EventTypeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` to `event_type`, merging duplicate labels.
    pub fn add(&mut self, event_type: impl Into<String>, count: u64) {
        *self.0.entry(event_type.into()).or_insert(0) += count;
    }

    /// Build from `(label, count)` rows as returned by a `GROUP BY` query.
    /// Negative counts are treated as zero.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, i64)>) -> Self {
        let mut counts = Self::new();
        for (event_type, count) in rows {
            counts.add(event_type, u64::try_from(count).unwrap_or(0));
        }
        counts
    }

    /// Total number of events across all types.
    pub fn event_count(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of unique event-type labels.
    pub fn distinct_types(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, event_type: &str) -> Option<u64> {
        self.0.get(event_type).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for EventTypeCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (event_type, count) in iter {
            counts.add(event_type, count);
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// ChildProfile
// ---------------------------------------------------------------------------

/// What the engine needs to know about a child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildProfile {
    pub birthdate: Option<NaiveDate>,
    /// Raw intake-survey answers, unsanitized.
    pub survey_data: Option<Value>,
}

/// Whole calendar months from `birthdate` to `at`.
///
/// Rounds down: when `at`'s day-of-month is earlier than the birth
/// day-of-month, the current month is not yet complete. Negative when
/// `at` precedes the birthdate.
pub fn age_in_months(birthdate: NaiveDate, at: NaiveDate) -> i32 {
    let years = at.year() - birthdate.year();
    let months = at.month() as i32 - birthdate.month() as i32;
    let mut total = years * 12 + months;
    if at.day() < birthdate.day() {
        total -= 1;
    }
    total
}

// ---------------------------------------------------------------------------
// Options and context
// ---------------------------------------------------------------------------

/// Caller-supplied knobs for a single `generate` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Allow an `initial` plan to proceed on survey data alone when the
    /// sanity gate would otherwise deny it.
    pub allow_survey_only: bool,
    /// Survey answers that take precedence over the child's stored ones.
    pub survey_data: Option<Value>,
    /// Whether the intake survey has been fully answered.
    pub survey_complete: Option<bool>,
    /// Free-form context (e.g. a consultation transcript), embedded as is.
    pub extra_context: Option<Value>,
}

/// Flags describing which signals the context carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFlags {
    pub allow_survey_only: bool,
    pub survey_complete: bool,
    pub events_available: bool,
}

/// The bounded payload embedded in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanContext {
    pub child_id: Uuid,
    pub window: EventWindow,
    pub by_type: EventTypeCounts,
    pub event_count: u64,
    pub distinct_types: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_in_months: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    pub flags: ContextFlags,
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The kind of routine plan being generated.
///
/// `Initial` plans are produced right after intake and may rely on survey
/// answers alone; `EventBased` plans are derived from logged events;
/// `TranscriptRefinement` plans revise an existing routine using a
/// consultation transcript passed as extra context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Initial,
    EventBased,
    TranscriptRefinement,
}

impl PlanKind {
    /// Stable snake_case label, usable as a metrics label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::EventBased => "event_based",
            Self::TranscriptRefinement => "transcript_refinement",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanKind {
    type Err = PlanKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "event_based" => Ok(Self::EventBased),
            "transcript_refinement" => Ok(Self::TranscriptRefinement),
            other => Err(PlanKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanKind`] string.
#[derive(Debug, Clone)]
pub struct PlanKindParseError(pub String);

impl fmt::Display for PlanKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid plan kind: {:?} (expected initial, event_based, or transcript_refinement)",
            self.0
        )
    }
}

impl std::error::Error for PlanKindParseError {}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A child whose routine is being tracked.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: Uuid,
    pub name: String,
    pub birthdate: Option<NaiveDate>,
    /// Raw intake-survey answers, stored as submitted.
    pub survey_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// A single logged event (sleep, nap, feeding, wake, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub child_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A generated plan that passed validation and was saved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredPlan {
    pub id: Uuid,
    pub child_id: Uuid,
    pub plan_kind: PlanKind,
    pub title: String,
    /// The validated plan document.
    pub payload: Value,
    pub attempts: i32,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

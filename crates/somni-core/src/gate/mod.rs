//! Sanity gate: decides whether a [`PlanContext`] carries enough signal to
//! be worth a model call.
//!
//! The gate is a pure function. It checks, in order:
//!
//! 1. at least `min_events` events in the window,
//! 2. at least `min_distinct_types` distinct event types,
//! 3. a known, non-negative age in months.
//!
//! Only the first failing check is reported. A failing gate is bypassed
//! for `initial` plans when the caller explicitly allows survey-only
//! generation; the bypass relaxes nothing else.

use std::fmt;

use somni_db::models::PlanKind;

use crate::config::EngineConfig;
use crate::context::PlanContext;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why the gate rejected a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    NotEnoughEvents,
    NotEnoughDistinctTypes,
    InvalidAge,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotEnoughEvents => "not_enough_events",
            Self::NotEnoughDistinctTypes => "not_enough_distinct_types",
            Self::InvalidAge => "invalid_age",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of evaluating the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Every check passed.
    Passed,
    /// A check failed but survey-only generation was allowed for an
    /// initial plan.
    Bypassed { reason: DenyReason },
    /// A check failed and no bypass applies.
    Denied { reason: DenyReason },
}

impl GateDecision {
    /// Whether generation should proceed.
    pub fn proceeds(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateThresholds {
    pub min_events: u64,
    pub min_distinct_types: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for GateThresholds {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_events: config.min_events,
            min_distinct_types: config.min_distinct_types,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Return the first failing check, if any.
pub fn first_failure(context: &PlanContext, thresholds: &GateThresholds) -> Option<DenyReason> {
    if context.event_count < thresholds.min_events {
        return Some(DenyReason::NotEnoughEvents);
    }
    if context.distinct_types < thresholds.min_distinct_types {
        return Some(DenyReason::NotEnoughDistinctTypes);
    }
    match context.age_in_months {
        Some(months) if months >= 0 => None,
        _ => Some(DenyReason::InvalidAge),
    }
}

/// Evaluate the gate for a context.
pub fn evaluate(
    context: &PlanContext,
    kind: PlanKind,
    allow_survey_only: bool,
    thresholds: &GateThresholds,
) -> GateDecision {
    match first_failure(context, thresholds) {
        None => GateDecision::Passed,
        Some(reason) if kind == PlanKind::Initial && allow_survey_only => {
            GateDecision::Bypassed { reason }
        }
        Some(reason) => GateDecision::Denied { reason },
    }
}

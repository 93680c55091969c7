//! Plan context assembly.
//!
//! [`ContextBuilder`] pulls event counts and the child profile from the
//! collaborators, derives the child's age at the end of the window,
//! sanitizes survey answers, and produces the [`PlanContext`] that is
//! handed to the sanity gate and embedded in the prompt.

pub mod sanitize;
pub mod types;

use anyhow::{Context as _, Result};
use uuid::Uuid;

use somni_db::models::PlanKind;

use crate::observability::ObservabilityRecorder;
use crate::source::{ChildProfileLookup, EventStatsCollector};

pub use sanitize::sanitize_survey;
pub use types::{
    ChildProfile, ContextFlags, EventTypeCounts, EventWindow, GenerateOptions, PlanContext,
    WindowError, age_in_months,
};

/// Builds a [`PlanContext`] for one child and window.
pub struct ContextBuilder<'a> {
    events: &'a dyn EventStatsCollector,
    profiles: &'a dyn ChildProfileLookup,
    recorder: &'a ObservabilityRecorder,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        events: &'a dyn EventStatsCollector,
        profiles: &'a dyn ChildProfileLookup,
        recorder: &'a ObservabilityRecorder,
    ) -> Self {
        Self {
            events,
            profiles,
            recorder,
        }
    }

    /// Assemble the context.
    ///
    /// 1. Counts events by type over `window`.
    /// 2. Looks up the child profile (a missing child yields no age and no
    ///    stored survey data).
    /// 3. Derives `age_in_months` at the window end.
    /// 4. Picks `options.survey_data` over stored survey data and sanitizes it.
    ///
    /// Fails only when a collaborator lookup fails.
    pub async fn build(
        &self,
        child_id: Uuid,
        kind: PlanKind,
        window: EventWindow,
        options: &GenerateOptions,
    ) -> Result<PlanContext> {
        let by_type = self
            .events
            .count_by_types(child_id, &window)
            .await
            .with_context(|| format!("failed to count events for child {child_id}"))?;

        let profile = self
            .profiles
            .find_by_id(child_id)
            .await
            .with_context(|| format!("failed to look up child {child_id}"))?
            .unwrap_or_default();

        let age = profile
            .birthdate
            .map(|birthdate| age_in_months(birthdate, window.to().date_naive()));

        let survey_data = options
            .survey_data
            .as_ref()
            .or(profile.survey_data.as_ref())
            .and_then(sanitize_survey);

        let event_count = by_type.event_count();
        let distinct_types = by_type.distinct_types();

        let context = PlanContext {
            child_id,
            window,
            by_type,
            event_count,
            distinct_types,
            age_in_months: age,
            survey_data,
            extra: options.extra_context.clone(),
            flags: ContextFlags {
                allow_survey_only: options.allow_survey_only,
                survey_complete: options.survey_complete.unwrap_or(false),
                events_available: event_count > 0,
            },
        };

        self.recorder.context_built(kind, &context);
        Ok(context)
    }
}

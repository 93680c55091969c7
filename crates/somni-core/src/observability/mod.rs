//! Structured logs and metrics for plan generation.
//!
//! Every stage transition emits one `tracing` event carrying an `event`
//! field (`context_built`, `gate_denied`, `gate_bypassed`,
//! `inference_start`, `inference_end`, `validation_failed`, `success`,
//! `abort`). Prompt text, raw model output, and survey content are never
//! logged.
//!
//! Counters and the inference histogram go through the `metrics` facade,
//! which is process-wide and safe under concurrent increments. Without an
//! installed recorder these calls are no-ops.

use std::time::Duration;

use metrics::{histogram, increment_counter};
use somni_db::models::PlanKind;

use crate::context::PlanContext;
use crate::gate::DenyReason;

/// Counter: plans that validated, labelled by `kind`.
pub const PLANS_GENERATED: &str = "somni_plans_generated_total";
/// Counter: generations that ended without a plan, labelled by `kind` and `reason`.
pub const PLANS_ABORTED: &str = "somni_plans_aborted_total";
/// Counter: attempts whose output failed validation, labelled by `kind`.
pub const VALIDATION_FAILURES: &str = "somni_plan_validation_failures_total";
/// Histogram: wall time of each model call in milliseconds, labelled by `kind`.
pub const INFERENCE_DURATION_MS: &str = "somni_plan_inference_duration_ms";

/// Emits the engine's logs and metrics. Stateless; cheap to clone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilityRecorder;

impl ObservabilityRecorder {
    pub fn new() -> Self {
        Self
    }

    pub fn context_built(&self, kind: PlanKind, context: &PlanContext) {
        tracing::info!(
            event = "context_built",
            child_id = %context.child_id,
            kind = %kind,
            event_count = context.event_count,
            distinct_types = context.distinct_types,
            age_in_months = ?context.age_in_months,
            survey_included = context.survey_data.is_some(),
            extra_included = context.extra.is_some(),
            "plan context built"
        );
    }

    pub fn gate_passed(&self, kind: PlanKind, context: &PlanContext) {
        tracing::debug!(
            event = "gate_passed",
            child_id = %context.child_id,
            kind = %kind,
            event_count = context.event_count,
            distinct_types = context.distinct_types,
            "sanity gate passed"
        );
    }

    pub fn gate_denied(&self, kind: PlanKind, context: &PlanContext, reason: DenyReason) {
        tracing::warn!(
            event = "gate_denied",
            child_id = %context.child_id,
            kind = %kind,
            reason = %reason,
            event_count = context.event_count,
            distinct_types = context.distinct_types,
            age_in_months = ?context.age_in_months,
            from = %context.window.from(),
            to = %context.window.to(),
            "sanity gate denied plan generation"
        );
    }

    pub fn gate_bypassed(&self, kind: PlanKind, context: &PlanContext, reason: DenyReason) {
        tracing::info!(
            event = "gate_bypassed",
            child_id = %context.child_id,
            kind = %kind,
            failed_check = %reason,
            event_count = context.event_count,
            distinct_types = context.distinct_types,
            age_in_months = ?context.age_in_months,
            survey_complete = context.flags.survey_complete,
            from = %context.window.from(),
            to = %context.window.to(),
            "sanity gate bypassed for survey-only initial plan"
        );
    }

    pub fn inference_start(&self, kind: PlanKind, attempt: u8, model: &str, provider: &str) {
        tracing::info!(
            event = "inference_start",
            kind = %kind,
            attempt,
            model,
            provider,
            "model call started"
        );
    }

    pub fn inference_end(&self, kind: PlanKind, attempt: u8, elapsed: Duration, ok: bool) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            event = "inference_end",
            kind = %kind,
            attempt,
            elapsed_ms,
            ok,
            "model call finished"
        );
        histogram!(INFERENCE_DURATION_MS, elapsed.as_secs_f64() * 1000.0, "kind" => kind.as_str());
    }

    /// A single attempt failed. `category` is a fixed label, never model text.
    pub fn validation_failed(&self, kind: PlanKind, attempt: u8, category: &'static str) {
        tracing::warn!(
            event = "validation_failed",
            kind = %kind,
            attempt,
            category,
            "model output rejected"
        );
        increment_counter!(VALIDATION_FAILURES, "kind" => kind.as_str());
    }

    pub fn success(&self, kind: PlanKind, attempts: u8, inference_ms: u64) {
        tracing::info!(
            event = "success",
            kind = %kind,
            attempts,
            inference_ms,
            "plan generated"
        );
        increment_counter!(PLANS_GENERATED, "kind" => kind.as_str());
    }

    pub fn abort(&self, kind: PlanKind, reason: &'static str, attempts: u8, inference_ms: u64) {
        tracing::warn!(
            event = "abort",
            kind = %kind,
            reason,
            attempts,
            inference_ms,
            "plan generation aborted"
        );
        increment_counter!(PLANS_ABORTED, "kind" => kind.as_str(), "reason" => reason);
    }
}

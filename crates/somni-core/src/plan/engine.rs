//! The plan generation pipeline.
//!
//! `generate` runs: context build, sanity gate, then up to two sequential
//! model attempts, each followed by output validation. The second attempt
//! reuses the first prompt with a fixed corrective suffix. Every path ends
//! in a [`GenerationResult`]; nothing escapes as an error or a panic.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use somni_db::models::PlanKind;

use crate::config::EngineConfig;
use crate::context::{ContextBuilder, EventWindow, GenerateOptions, PlanContext};
use crate::gate::{self, GateDecision, GateThresholds};
use crate::model::{CompletionRequest, ModelClient};
use crate::observability::ObservabilityRecorder;
use crate::source::{ChildProfileLookup, EventStatsCollector};

use super::prompt::build_prompt;
use super::result::{GenerationError, GenerationResult};
use super::schema::{PlanOutput, ValidationError, validate_output};

/// Upper bound on model calls per request.
pub const MAX_ATTEMPTS: u8 = 2;

/// Why one attempt produced no plan.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("model call failed: {0:#}")]
    Model(anyhow::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl AttemptFailure {
    fn category(&self) -> &'static str {
        match self {
            Self::Model(_) => "model_error",
            Self::Invalid(e) => e.category(),
        }
    }
}

/// Generates daily routine plans for children.
///
/// Holds no per-request state; share one engine behind an `Arc` and call
/// [`generate`](Self::generate) concurrently.
pub struct PlanEngine {
    events: Arc<dyn EventStatsCollector>,
    profiles: Arc<dyn ChildProfileLookup>,
    model: Arc<dyn ModelClient>,
    config: EngineConfig,
    recorder: ObservabilityRecorder,
}

impl PlanEngine {
    pub fn new(
        events: Arc<dyn EventStatsCollector>,
        profiles: Arc<dyn ChildProfileLookup>,
        model: Arc<dyn ModelClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            events,
            profiles,
            model,
            config,
            recorder: ObservabilityRecorder::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate a plan of `kind` for `child_id`.
    ///
    /// `window` defaults to the `lookback_days` ending now.
    pub async fn generate(
        &self,
        child_id: Uuid,
        kind: PlanKind,
        window: Option<EventWindow>,
        options: GenerateOptions,
    ) -> GenerationResult {
        let window = match window {
            Some(window) => window,
            None => match EventWindow::ending_at(Utc::now(), self.config.lookback()) {
                Ok(window) => window,
                Err(e) => return self.lookup_failed(child_id, kind, e.into()),
            },
        };

        let builder = ContextBuilder::new(
            self.events.as_ref(),
            self.profiles.as_ref(),
            &self.recorder,
        );
        let context = match builder.build(child_id, kind, window, &options).await {
            Ok(context) => context,
            Err(e) => return self.lookup_failed(child_id, kind, e),
        };

        let thresholds = GateThresholds::from(&self.config);
        match gate::evaluate(&context, kind, options.allow_survey_only, &thresholds) {
            GateDecision::Passed => self.recorder.gate_passed(kind, &context),
            GateDecision::Bypassed { reason } => {
                self.recorder.gate_bypassed(kind, &context, reason)
            }
            GateDecision::Denied { reason } => {
                self.recorder.gate_denied(kind, &context, reason);
                let error = GenerationError::InsufficientData;
                self.recorder.abort(kind, error.as_str(), 0, 0);
                return GenerationResult::Failed {
                    error,
                    reason: Some(reason.as_str().to_owned()),
                    attempts: 0,
                    inference_ms: 0,
                };
            }
        }

        self.run_attempts(kind, &context).await
    }

    /// Up to [`MAX_ATTEMPTS`] sequential model calls.
    async fn run_attempts(&self, kind: PlanKind, context: &PlanContext) -> GenerationResult {
        let started = Instant::now();
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let prompt = build_prompt(kind, context, attempt > 1);
            match self.attempt(kind, attempt, prompt).await {
                Ok(output) => {
                    let inference_ms = elapsed_ms(started);
                    self.recorder.success(kind, attempt, inference_ms);
                    return GenerationResult::Generated {
                        output,
                        attempts: attempt,
                        inference_ms,
                    };
                }
                Err(failure) => {
                    self.recorder
                        .validation_failed(kind, attempt, failure.category());
                    last_failure = Some(failure);
                }
            }
        }

        let inference_ms = elapsed_ms(started);
        let error = GenerationError::ValidationFailed;
        self.recorder
            .abort(kind, error.as_str(), MAX_ATTEMPTS, inference_ms);
        GenerationResult::Failed {
            error,
            reason: last_failure.map(|f| f.category().to_owned()),
            attempts: MAX_ATTEMPTS,
            inference_ms,
        }
    }

    /// One model call plus validation of its output.
    async fn attempt(
        &self,
        kind: PlanKind,
        attempt: u8,
        prompt: String,
    ) -> Result<PlanOutput, AttemptFailure> {
        let request = CompletionRequest {
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        self.recorder
            .inference_start(kind, attempt, self.model.model(), self.model.provider());
        let started = Instant::now();
        let raw = self.model.complete(&request).await;
        self.recorder
            .inference_end(kind, attempt, started.elapsed(), raw.is_ok());

        let raw = raw.map_err(|e| {
            tracing::warn!(kind = %kind, attempt, error = %format!("{e:#}"), "model call failed");
            AttemptFailure::Model(e)
        })?;
        Ok(validate_output(&raw)?)
    }

    fn lookup_failed(&self, child_id: Uuid, kind: PlanKind, error: anyhow::Error) -> GenerationResult {
        let reason = format!("{error:#}");
        tracing::error!(child_id = %child_id, kind = %kind, error = %reason, "plan context lookup failed");
        let code = GenerationError::ModelError;
        self.recorder.abort(kind, code.as_str(), 0, 0);
        GenerationResult::Failed {
            error: code,
            reason: Some(reason),
            attempts: 0,
            inference_ms: 0,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// Compile-time assertion: the engine can be shared across tasks.
const _: () = {
    fn _assert_send_sync<T: Send + Sync>() {}
    fn _assert() {
        _assert_send_sync::<PlanEngine>();
    }
};

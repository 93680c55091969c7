//! Integration tests for `PlanEngine::generate`.
//!
//! Collaborators are in-memory doubles; the model is scripted with a queue
//! of responses and records every request it receives.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use serde_json::json;
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

use somni_core::EngineConfig;
use somni_core::context::{ChildProfile, EventTypeCounts, GenerateOptions};
use somni_core::plan::{GenerationError, GenerationResult, PlanEngine, RETRY_SUFFIX};
use somni_db::models::PlanKind;

use common::*;

// ===========================================================================
// Scenarios
// ===========================================================================

#[tokio::test]
async fn valid_first_output_succeeds_in_one_attempt() {
    let h = harness(rich_counts(), profile(), vec![Ok(valid_plan().to_string())]);

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert!(result.is_ok(), "unexpected result: {result:?}");
    assert_eq!(result.attempts(), 1);
    assert_eq!(h.model.calls(), 1);
    let output = result.output().unwrap();
    assert_eq!(output.schedule.bedtime, "19:15");
    assert!(!h.model.prompts()[0].contains(RETRY_SUFFIX));
}

#[tokio::test]
async fn too_few_events_is_denied_without_model_call() {
    let h = harness(counts(&[("sleep", 3), ("nap", 1)]), profile(), vec![]);

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(
        result,
        GenerationResult::Failed {
            error: GenerationError::InsufficientData,
            reason: Some("not_enough_events".to_string()),
            attempts: 0,
            inference_ms: 0,
        }
    );
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn survey_only_initial_plan_bypasses_gate() {
    let h = harness(EventTypeCounts::new(), profile(), vec![Ok(valid_plan().to_string())]);
    let options = GenerateOptions {
        allow_survey_only: true,
        survey_complete: Some(true),
        survey_data: Some(json!({"bedtime": "around 8pm", "naps": 2})),
        extra_context: None,
    };

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::Initial, Some(window()), options)
        .await;

    assert!(result.is_ok());
    assert_eq!(h.model.calls(), 1);
    let prompt = &h.model.prompts()[0];
    assert!(prompt.contains("\"surveyComplete\": true"));
    assert!(prompt.contains("around 8pm"));
}

#[tokio::test]
async fn unparseable_first_output_recovers_on_retry() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![
            Ok("Sure! Here is the plan you asked for.".to_string()),
            Ok(valid_plan().to_string()),
        ],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert!(result.is_ok());
    assert_eq!(result.attempts(), 2);

    let prompts = h.model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains(RETRY_SUFFIX));
    assert!(prompts[1].ends_with(RETRY_SUFFIX));
    assert!(prompts[1].starts_with(&prompts[0]));
}

#[tokio::test]
async fn two_invalid_outputs_fail_validation() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![Ok(plan_without_bedtime()), Ok(plan_without_bedtime())],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert!(!result.is_ok());
    assert_eq!(result.error(), Some(GenerationError::ValidationFailed));
    assert_eq!(result.reason(), Some("schema"));
    assert_eq!(result.attempts(), 2);
    assert_eq!(h.model.calls(), 2);
}

// ===========================================================================
// Attempt accounting
// ===========================================================================

#[tokio::test]
async fn never_makes_a_third_attempt() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![
            Ok("nope".to_string()),
            Ok("still nope".to_string()),
            Ok(valid_plan().to_string()),
        ],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(result.attempts(), 2);
    assert_eq!(result.reason(), Some("parse"));
    assert_eq!(h.model.calls(), 2);
}

#[tokio::test]
async fn transport_error_counts_as_failed_attempt() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![Err(anyhow!("connection reset")), Ok(valid_plan().to_string())],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert!(result.is_ok());
    assert_eq!(result.attempts(), 2);
}

#[tokio::test]
async fn repeated_transport_errors_fail_validation() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![Err(anyhow!("timeout")), Err(anyhow!("timeout"))],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(result.error(), Some(GenerationError::ValidationFailed));
    assert_eq!(result.reason(), Some("model_error"));
    assert_eq!(result.attempts(), 2);
}

#[tokio::test]
async fn model_declining_is_retried() {
    let h = harness(
        rich_counts(),
        profile(),
        vec![
            Ok(r#"{"error":"insufficient_data","reason":"no wake times"}"#.to_string()),
            Ok(r#"{"error":"insufficient_data","reason":"no wake times"}"#.to_string()),
        ],
    );

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(result.error(), Some(GenerationError::ValidationFailed));
    assert_eq!(result.reason(), Some("declined"));
    assert_eq!(h.model.calls(), 2);
}

#[tokio::test]
async fn lookup_failure_is_model_error_with_no_attempts() {
    let model = ScriptedModel::new(vec![Ok(valid_plan().to_string())]);
    let engine = PlanEngine::new(
        Arc::new(StaticEvents {
            counts: rich_counts(),
            fail: true,
        }),
        Arc::new(StaticProfiles { profile: profile() }),
        model.clone(),
        EngineConfig::default(),
    );

    let result = engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(result.error(), Some(GenerationError::ModelError));
    assert!(result.reason().unwrap().contains("events store unavailable"));
    assert_eq!(result.attempts(), 0);
    assert_eq!(result.inference_ms(), 0);
    assert_eq!(model.calls(), 0);
}

// ===========================================================================
// Gate edge cases
// ===========================================================================

#[tokio::test]
async fn unknown_child_is_denied_for_invalid_age() {
    let h = harness(rich_counts(), None, vec![]);

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert_eq!(result.error(), Some(GenerationError::InsufficientData));
    assert_eq!(result.reason(), Some("invalid_age"));
}

#[tokio::test]
async fn survey_only_flag_does_not_bypass_other_kinds() {
    let h = harness(EventTypeCounts::new(), profile(), vec![]);
    let options = GenerateOptions {
        allow_survey_only: true,
        ..GenerateOptions::default()
    };

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), options)
        .await;

    assert_eq!(result.error(), Some(GenerationError::InsufficientData));
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn custom_thresholds_apply() {
    let model = ScriptedModel::new(vec![Ok(valid_plan().to_string())]);
    let config = EngineConfig {
        min_events: 2,
        min_distinct_types: 1,
        ..EngineConfig::default()
    };
    let engine = PlanEngine::new(
        Arc::new(StaticEvents {
            counts: counts(&[("sleep", 2)]),
            fail: false,
        }),
        Arc::new(StaticProfiles { profile: profile() }),
        model.clone(),
        config,
    );

    let result = engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    assert!(result.is_ok());
    assert_eq!(model.calls(), 1);
}

// ===========================================================================
// Context
// ===========================================================================

#[tokio::test]
async fn caller_survey_data_overrides_stored_survey() {
    let stored = ChildProfile {
        birthdate: Some(birthdate()),
        survey_data: Some(json!({"source": "stored answers"})),
    };
    let h = harness(rich_counts(), Some(stored), vec![Ok(valid_plan().to_string())]);
    let options = GenerateOptions {
        survey_data: Some(json!({"source": "caller answers"})),
        ..GenerateOptions::default()
    };

    h.engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), options)
        .await;

    let prompt = &h.model.prompts()[0];
    assert!(prompt.contains("caller answers"));
    assert!(!prompt.contains("stored answers"));
}

#[tokio::test]
async fn prompt_carries_sanitized_survey_and_age() {
    let long_answer = "z".repeat(1500);
    let stored = ChildProfile {
        birthdate: Some(birthdate()),
        survey_data: Some(json!({"notes": long_answer, "skipped": null})),
    };
    let h = harness(rich_counts(), Some(stored), vec![Ok(valid_plan().to_string())]);

    h.engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    let prompt = &h.model.prompts()[0];
    assert!(prompt.contains("\"ageInMonths\": 8"));
    assert!(prompt.contains(&"z".repeat(1000)));
    assert!(!prompt.contains(&"z".repeat(1001)));
    assert!(!prompt.contains("skipped"));
}

#[tokio::test]
async fn default_window_is_used_when_omitted() {
    let h = harness(rich_counts(), profile(), vec![Ok(valid_plan().to_string())]);

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, None, GenerateOptions::default())
        .await;

    assert!(result.is_ok());
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test]
async fn concurrent_generations_are_independent() {
    let responses = (0..8).map(|_| Ok(valid_plan().to_string())).collect();
    let h = harness(rich_counts(), profile(), responses);
    let engine = Arc::new(h.engine);

    let calls = (0..8).map(|_| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok() && r.attempts() == 1));
    assert_eq!(h.model.calls(), 8);
}

// ===========================================================================
// Serialization
// ===========================================================================

#[tokio::test]
async fn successful_result_serializes_with_output_unchanged() {
    let h = harness(rich_counts(), profile(), vec![Ok(valid_plan().to_string())]);

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), GenerateOptions::default())
        .await;

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["attempts"], 1);
    assert_eq!(value["output"], valid_plan());
    assert!(value["inference_ms"].as_u64().is_some());
}

#[tokio::test]
async fn huge_lookback_setting_still_returns_a_result() {
    let model = ScriptedModel::new(vec![Ok(valid_plan().to_string())]);
    let config = EngineConfig::from_lookup(|key| {
        (key == somni_core::config::LOOKBACK_DAYS_ENV).then(|| "100000000".to_string())
    });
    let engine = PlanEngine::new(
        Arc::new(StaticEvents {
            counts: rich_counts(),
            fail: false,
        }),
        Arc::new(StaticProfiles { profile: profile() }),
        model.clone(),
        config,
    );

    let result = engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, None, GenerateOptions::default())
        .await;

    assert!(result.is_ok(), "unexpected result: {result:?}");
    assert_eq!(model.calls(), 1);
}

// ===========================================================================
// Logging
// ===========================================================================

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn logs_never_contain_survey_prompt_or_model_text() {
    const SECRET: &str = "bedtime-secret-7f3a";

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut plan = valid_plan();
    plan["summary"] = json!(format!("Summary mentioning {SECRET}"));
    let h = harness(
        rich_counts(),
        profile(),
        vec![
            Ok(format!("{SECRET}: not a plan")),
            Ok(plan.to_string()),
        ],
    );
    let options = GenerateOptions {
        survey_data: Some(json!({"notes": SECRET})),
        extra_context: Some(json!({"transcript": SECRET})),
        ..GenerateOptions::default()
    };

    let result = h
        .engine
        .generate(Uuid::new_v4(), PlanKind::EventBased, Some(window()), options)
        .await;

    assert!(result.is_ok());
    assert!(h.model.prompts()[0].contains(SECRET));

    let captured = logs.contents();
    for event in ["context_built", "inference_start", "validation_failed", "success"] {
        assert!(captured.contains(event), "missing {event} in logs:\n{captured}");
    }
    assert!(!captured.contains(SECRET), "survey or model text leaked:\n{captured}");
    assert!(!captured.contains(RETRY_SUFFIX));
}

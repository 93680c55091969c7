//! Test doubles and fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use somni_core::EngineConfig;
use somni_core::context::{ChildProfile, EventTypeCounts, EventWindow};
use somni_core::model::{CompletionRequest, ModelClient};
use somni_core::plan::PlanEngine;
use somni_core::source::{ChildProfileLookup, EventStatsCollector};

// ===========================================================================
// Test doubles
// ===========================================================================

pub struct StaticEvents {
    pub counts: EventTypeCounts,
    pub fail: bool,
}

#[async_trait]
impl EventStatsCollector for StaticEvents {
    async fn count_by_types(&self, _child_id: Uuid, _window: &EventWindow) -> Result<EventTypeCounts> {
        if self.fail {
            return Err(anyhow!("events store unavailable"));
        }
        Ok(self.counts.clone())
    }
}

pub struct StaticProfiles {
    pub profile: Option<ChildProfile>,
}

#[async_trait]
impl ChildProfileLookup for StaticProfiles {
    async fn find_by_id(&self, _child_id: Uuid) -> Result<Option<ChildProfile>> {
        Ok(self.profile.clone())
    }
}

/// Returns queued responses in order and records the prompts it was sent.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    fn provider(&self) -> &str {
        "test"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }
}

// ===========================================================================
// Fixtures
// ===========================================================================

pub fn window_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
}

pub fn window() -> EventWindow {
    EventWindow::ending_at(window_end(), chrono::Duration::days(14)).unwrap()
}

/// Eight months old at the window end.
pub fn birthdate() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 10).unwrap()
}

pub fn counts(pairs: &[(&str, u64)]) -> EventTypeCounts {
    pairs.iter().map(|&(t, n)| (t, n)).collect()
}

pub fn valid_plan() -> Value {
    json!({
        "planType": "event_based",
        "title": "Earlier evenings",
        "summary": "Move bedtime earlier and protect the midday nap.",
        "schedule": {
            "bedtime": "19:15",
            "wakeTime": "06:30",
            "meals": [{"time": "07:00", "type": "breakfast", "description": "Porridge"}],
            "activities": [{"time": "09:30", "activity": "Outdoor play", "duration": "30 min", "description": "Morning light"}],
            "naps": [{"time": "12:00", "duration": "90 min"}]
        },
        "objectives": ["Fall asleep before 19:45"],
        "recommendations": ["Keep the room dark during naps"],
        "window": {"from": "2026-03-01T00:00:00Z", "to": "2026-03-15T00:00:00Z"},
        "metrics": {"eventCount": 15, "distinctTypes": 3, "byType": {"feeding": 3, "nap": 4, "sleep": 8}, "ageInMonths": 8},
        "metadata": {"ragSources": []}
    })
}

pub fn plan_without_bedtime() -> String {
    let mut plan = valid_plan();
    plan["schedule"].as_object_mut().unwrap().remove("bedtime");
    plan.to_string()
}

pub struct Harness {
    pub engine: PlanEngine,
    pub model: Arc<ScriptedModel>,
}

pub fn harness(
    by_type: EventTypeCounts,
    profile: Option<ChildProfile>,
    responses: Vec<Result<String>>,
) -> Harness {
    let model = ScriptedModel::new(responses);
    let engine = PlanEngine::new(
        Arc::new(StaticEvents {
            counts: by_type,
            fail: false,
        }),
        Arc::new(StaticProfiles { profile }),
        model.clone(),
        EngineConfig::default(),
    );
    Harness { engine, model }
}

pub fn profile() -> Option<ChildProfile> {
    Some(ChildProfile {
        birthdate: Some(birthdate()),
        survey_data: None,
    })
}

pub fn rich_counts() -> EventTypeCounts {
    counts(&[("sleep", 8), ("nap", 4), ("feeding", 3)])
}


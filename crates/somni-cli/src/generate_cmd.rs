//! `somni generate <child-id>`: run the plan engine for one child and
//! print the result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use sqlx::PgPool;
use uuid::Uuid;

use somni_core::context::{EventWindow, GenerateOptions};
use somni_core::model::HttpModelClient;
use somni_core::source::{PgChildProfiles, PgEventStats};
use somni_core::{GenerationResult, PlanEngine, PlanOutput};
use somni_db::models::{PlanKind, StoredPlan};
use somni_db::queries::plans::{self, NewPlan};

use crate::children_cmd::read_json_file;
use crate::config::SomniConfig;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Child ID to generate a plan for
    pub child_id: String,
    /// Plan kind: initial, event_based, transcript_refinement
    #[arg(long, default_value = "event_based")]
    pub kind: PlanKind,
    /// Window start (RFC 3339). Defaults to the lookback before --to
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,
    /// Window end (RFC 3339). Defaults to now
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,
    /// Let an initial plan proceed on survey answers alone
    #[arg(long)]
    pub allow_survey_only: bool,
    /// Mark the intake survey as fully answered
    #[arg(long)]
    pub survey_complete: bool,
    /// JSON file with survey answers (overrides the stored answers)
    #[arg(long)]
    pub survey_file: Option<PathBuf>,
    /// JSON file with extra context, e.g. a consultation transcript
    #[arg(long)]
    pub extra_file: Option<PathBuf>,
    /// Store the plan in the database when generation succeeds
    #[arg(long)]
    pub save: bool,
    /// Model name (overrides SOMNI_MODEL_NAME and the config file)
    #[arg(long)]
    pub model: Option<String>,
}

/// Run the engine and print the result. Returns whether a plan was produced.
pub async fn run_generate(pool: &PgPool, config: &SomniConfig, args: &GenerateArgs) -> Result<bool> {
    let child_id = Uuid::parse_str(&args.child_id)
        .with_context(|| format!("invalid child ID: {}", args.child_id))?;

    let window = resolve_window(args.from, args.to, Utc::now(), config.engine_config.lookback())?;
    let options = GenerateOptions {
        allow_survey_only: args.allow_survey_only,
        survey_data: args.survey_file.as_deref().map(read_json_file).transpose()?,
        survey_complete: args.survey_complete.then_some(true),
        extra_context: args.extra_file.as_deref().map(read_json_file).transpose()?,
    };

    let model = HttpModelClient::new(config.model_config.clone())?;
    let engine = PlanEngine::new(
        Arc::new(PgEventStats::new(pool.clone())),
        Arc::new(PgChildProfiles::new(pool.clone())),
        Arc::new(model),
        config.engine_config.clone(),
    );

    let result = engine.generate(child_id, args.kind, window, options).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("failed to serialize result")?
    );

    if args.save {
        match &result {
            GenerationResult::Generated {
                output, attempts, ..
            } => {
                let stored = save_plan(
                    pool,
                    child_id,
                    args.kind,
                    output,
                    *attempts,
                    &config.model_config.model,
                )
                .await?;
                tracing::info!(plan_id = %stored.id, child_id = %child_id, "plan saved");
            }
            GenerationResult::Failed { .. } => {
                tracing::warn!(child_id = %child_id, "generation failed, nothing saved")
            }
        }
    }

    Ok(result.is_ok())
}

/// Turn the optional `--from`/`--to` flags into a window.
///
/// `None` lets the engine apply its default lookback ending now.
pub fn resolve_window(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: chrono::Duration,
) -> Result<Option<EventWindow>> {
    let window = match (from, to) {
        (None, None) => return Ok(None),
        (Some(from), Some(to)) => EventWindow::new(from, to),
        (None, Some(to)) => EventWindow::ending_at(to, lookback),
        (Some(from), None) => EventWindow::new(from, now),
    };
    Ok(Some(window.context("invalid --from/--to window")?))
}

/// Persist a validated plan.
pub async fn save_plan(
    pool: &PgPool,
    child_id: Uuid,
    kind: PlanKind,
    output: &PlanOutput,
    attempts: u8,
    model: &str,
) -> Result<StoredPlan> {
    let payload = serde_json::to_value(output).context("failed to serialize plan")?;
    plans::insert_plan(
        pool,
        &NewPlan {
            child_id,
            plan_kind: kind,
            title: &output.title,
            payload: &payload,
            attempts: i32::from(attempts),
            model,
        },
    )
    .await
}

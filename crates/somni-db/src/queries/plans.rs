//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{PlanKind, StoredPlan};

/// Parameters for inserting a generated plan.
#[derive(Debug, Clone)]
pub struct NewPlan<'a> {
    pub child_id: Uuid,
    pub plan_kind: PlanKind,
    pub title: &'a str,
    pub payload: &'a Value,
    pub attempts: i32,
    pub model: &'a str,
}

/// Insert a generated plan. Returns the inserted row with server-generated
/// defaults (id, created_at).
pub async fn insert_plan(pool: &PgPool, new: &NewPlan<'_>) -> Result<StoredPlan> {
    let plan = sqlx::query_as::<_, StoredPlan>(
        "INSERT INTO plans (child_id, plan_kind, title, payload, attempts, model) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.child_id)
    .bind(new.plan_kind)
    .bind(new.title)
    .bind(new.payload)
    .bind(new.attempts)
    .bind(new.model)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert {} plan for child {}", new.plan_kind, new.child_id))?;

    Ok(plan)
}

/// Fetch a stored plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<StoredPlan>> {
    let plan = sqlx::query_as::<_, StoredPlan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List a child's stored plans, newest first.
pub async fn list_plans_for_child(pool: &PgPool, child_id: Uuid) -> Result<Vec<StoredPlan>> {
    let plans = sqlx::query_as::<_, StoredPlan>(
        "SELECT * FROM plans WHERE child_id = $1 ORDER BY created_at DESC",
    )
    .bind(child_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list plans for child {child_id}"))?;

    Ok(plans)
}

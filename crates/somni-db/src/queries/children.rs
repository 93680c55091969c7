//! Database query functions for the `children` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Child;

/// Insert a new child row. Returns the inserted row with server-generated
/// defaults (id, created_at).
pub async fn insert_child(
    pool: &PgPool,
    name: &str,
    birthdate: Option<NaiveDate>,
    survey_data: Option<&Value>,
) -> Result<Child> {
    let child = sqlx::query_as::<_, Child>(
        "INSERT INTO children (name, birthdate, survey_data) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(birthdate)
    .bind(survey_data)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert child {name:?}"))?;

    Ok(child)
}

/// Fetch a child by ID.
pub async fn get_child(pool: &PgPool, id: Uuid) -> Result<Option<Child>> {
    let child = sqlx::query_as::<_, Child>("SELECT * FROM children WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch child {id}"))?;

    Ok(child)
}

/// Replace the stored intake-survey answers for a child.
pub async fn update_survey_data(pool: &PgPool, id: Uuid, survey_data: &Value) -> Result<()> {
    let result = sqlx::query("UPDATE children SET survey_data = $1 WHERE id = $2")
        .bind(survey_data)
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to update survey data for child {id}"))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("child {id} not found");
    }

    Ok(())
}

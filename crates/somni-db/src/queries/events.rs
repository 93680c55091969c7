//! Database query functions for the `events` table.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Event;

/// Parameters for inserting a new event row.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub child_id: Uuid,
    pub event_type: &'a str,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<&'a str>,
}

/// Insert a new event row. Returns the inserted row with server-generated
/// defaults (id, recorded_at).
pub async fn insert_event(pool: &PgPool, new: &NewEvent<'_>) -> Result<Event> {
    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (child_id, event_type, occurred_at, notes) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(new.child_id)
    .bind(new.event_type)
    .bind(new.occurred_at)
    .bind(new.notes)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert {} event for child {}",
            new.event_type, new.child_id
        )
    })?;

    Ok(event)
}

/// Count a child's events per `event_type` within `[from, to)`.
///
/// Rows come back ordered by event type. Rejects an empty or inverted
/// range instead of silently returning nothing.
pub async fn count_by_types(
    pool: &PgPool,
    child_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<(String, i64)>> {
    if from >= to {
        bail!("invalid event window: from {from} is not before to {to}");
    }

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, COUNT(*) FROM events \
         WHERE child_id = $1 AND occurred_at >= $2 AND occurred_at < $3 \
         GROUP BY event_type \
         ORDER BY event_type",
    )
    .bind(child_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to count events by type for child {child_id}"))?;

    Ok(rows)
}

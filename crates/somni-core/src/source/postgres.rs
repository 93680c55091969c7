//! PostgreSQL-backed collaborators built on `somni-db` queries.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use somni_db::queries::{children, events};

use super::{ChildProfileLookup, EventStatsCollector};
use crate::context::{ChildProfile, EventTypeCounts, EventWindow};

/// Event counts from the `events` table.
#[derive(Debug, Clone)]
pub struct PgEventStats {
    pool: PgPool,
}

impl PgEventStats {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStatsCollector for PgEventStats {
    async fn count_by_types(
        &self,
        child_id: Uuid,
        window: &EventWindow,
    ) -> Result<EventTypeCounts> {
        let rows = events::count_by_types(&self.pool, child_id, window.from(), window.to()).await?;
        Ok(EventTypeCounts::from_rows(rows))
    }
}

/// Child profiles from the `children` table.
#[derive(Debug, Clone)]
pub struct PgChildProfiles {
    pool: PgPool,
}

impl PgChildProfiles {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChildProfileLookup for PgChildProfiles {
    async fn find_by_id(&self, child_id: Uuid) -> Result<Option<ChildProfile>> {
        let child = children::get_child(&self.pool, child_id).await?;
        Ok(child.map(|c| ChildProfile {
            birthdate: c.birthdate,
            survey_data: c.survey_data,
        }))
    }
}

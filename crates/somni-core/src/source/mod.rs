//! Collaborator interfaces the engine reads from.
//!
//! The engine depends only on these traits; [`postgres`] provides the
//! production implementations and tests substitute in-memory doubles.
//! Both traits are object safe so they can be held as `Arc<dyn ...>`.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::context::{ChildProfile, EventTypeCounts, EventWindow};

pub use postgres::{PgChildProfiles, PgEventStats};

/// Aggregates a child's logged events by type.
#[async_trait]
pub trait EventStatsCollector: Send + Sync {
    /// Count events per type within `window` (`[from, to)`).
    async fn count_by_types(&self, child_id: Uuid, window: &EventWindow)
    -> Result<EventTypeCounts>;
}

/// Looks up the profile data the engine needs about a child.
#[async_trait]
pub trait ChildProfileLookup: Send + Sync {
    /// Return the child's profile, or `None` if no such child exists.
    async fn find_by_id(&self, child_id: Uuid) -> Result<Option<ChildProfile>>;
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: () = {
    fn _assert_object_safe(_: &dyn EventStatsCollector, _: &dyn ChildProfileLookup) {}
};

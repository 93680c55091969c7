//! Shared test utilities for somni integration tests.
//!
//! Provides a PostgreSQL instance shared across the tests of one binary,
//! a fresh migrated database per test, and fixture helpers for children and
//! their event history.
//!
//! Two modes:
//! - **`SOMNI_TEST_PG_URL`** set: use that server directly.
//! - **No env var**: start a container via testcontainers, shared per test
//!   binary through a `OnceCell`.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use somni_db::models::Child;
use somni_db::pool;
use somni_db::queries::children;
use somni_db::queries::events::{self, NewEvent};

/// Base URL plus the container handle that keeps it alive.
struct SharedPg {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("SOMNI_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server root URL of the shared PostgreSQL (no database name appended).
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

async fn connect(url: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"))
}

/// Create a uniquely named database with migrations applied.
///
/// Returns `(pool, db_name)`; pass `db_name` to [`drop_test_db`] when done.
pub async fn create_test_db() -> (PgPool, String) {
    let base_url = pg_url().await;

    let maint_pool = connect(&format!("{base_url}/postgres"), 1).await;
    let db_name = format!("somni_test_{}", Uuid::new_v4().simple());
    maint_pool
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint_pool.close().await;

    let temp_pool = connect(&format!("{base_url}/{db_name}"), 5).await;
    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    (temp_pool, db_name)
}

/// Drop a database created by [`create_test_db`], terminating any
/// connections still attached to it.
pub async fn drop_test_db(db_name: &str) {
    let base_url = pg_url().await;
    let maint_pool = connect(&format!("{base_url}/postgres"), 1).await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint_pool.execute(terminate.as_str()).await;
    let _ = maint_pool
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maint_pool.close().await;
}

/// Insert a child fixture.
pub async fn seed_child(
    pool: &PgPool,
    birthdate: Option<NaiveDate>,
    survey_data: Option<&Value>,
) -> Child {
    children::insert_child(pool, "Test Child", birthdate, survey_data)
        .await
        .expect("insert child")
}

/// Insert `count` events of each listed type, spaced one minute apart
/// starting at `start`.
pub async fn seed_events(
    pool: &PgPool,
    child_id: Uuid,
    start: DateTime<Utc>,
    counts: &[(&str, usize)],
) {
    let mut offset = 0i64;
    for &(event_type, count) in counts {
        for _ in 0..count {
            let new = NewEvent {
                child_id,
                event_type,
                occurred_at: start + chrono::Duration::minutes(offset),
                notes: None,
            };
            events::insert_event(pool, &new).await.expect("insert event");
            offset += 1;
        }
    }
}

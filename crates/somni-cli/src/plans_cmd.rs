//! `somni plans <child-id>`: list a child's saved plans.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use somni_db::queries::plans;

pub async fn run_plans(pool: &PgPool, child_id: &str) -> Result<()> {
    let id = Uuid::parse_str(child_id).with_context(|| format!("invalid child ID: {child_id}"))?;
    let plans = plans::list_plans_for_child(pool, id).await?;

    if plans.is_empty() {
        println!("No plans found. Use `somni generate {child_id} --save` to create one.");
        return Ok(());
    }

    // ID is always 36 chars (UUID). Kind max is 21 (transcript_refinement).
    let id_w = 36;
    let kind_w = 21;
    let model_w = plans.iter().map(|p| p.model.len()).max().unwrap_or(5).max(5);

    println!(
        "{:<id_w$}  {:<kind_w$}  {:<model_w$}  ATTEMPTS  {:<16}  TITLE",
        "ID", "KIND", "MODEL", "CREATED",
    );
    for plan in &plans {
        let created = plan.created_at.format("%Y-%m-%d %H:%M");
        println!(
            "{:<id_w$}  {:<kind_w$}  {:<model_w$}  {:>8}  {:<16}  {}",
            plan.id,
            plan.plan_kind.as_str(),
            plan.model,
            plan.attempts,
            created.to_string(),
            plan.title,
        );
    }

    Ok(())
}

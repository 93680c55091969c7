//! `somni child-add` and `somni survey`: manage the children plans are
//! generated for.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use somni_db::queries::children;

/// Insert a child and print its ID.
pub async fn run_child_add(
    pool: &PgPool,
    name: &str,
    birthdate: Option<NaiveDate>,
    survey_file: Option<&Path>,
) -> Result<()> {
    let survey = survey_file.map(read_json_file).transpose()?;
    let child = children::insert_child(pool, name, birthdate, survey.as_ref()).await?;

    println!("Child created.");
    println!();
    println!("  Child ID:   {}", child.id);
    println!("  Name:       {}", child.name);
    match child.birthdate {
        Some(date) => println!("  Birthdate:  {date}"),
        None => println!("  Birthdate:  (unknown)"),
    }
    println!(
        "  Survey:     {}",
        if child.survey_data.is_some() { "stored" } else { "none" }
    );
    Ok(())
}

/// Replace a child's stored survey answers with the contents of `file`.
pub async fn run_survey(pool: &PgPool, child_id: &str, file: &Path) -> Result<()> {
    let id = Uuid::parse_str(child_id).with_context(|| format!("invalid child ID: {child_id}"))?;
    let survey = read_json_file(file)?;
    children::update_survey_data(pool, id, &survey).await?;
    println!("Survey answers stored for child {id}.");
    Ok(())
}

pub fn read_json_file(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

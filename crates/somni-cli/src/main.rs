mod children_cmd;
mod config;
mod generate_cmd;
mod plans_cmd;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use somni_core::model::ModelConfig;
use somni_db::pool;

use config::{CliOverrides, SomniConfig};
use generate_cmd::GenerateArgs;

#[derive(Parser)]
#[command(name = "somni", about = "Daily routine plans from child sleep data")]
struct Cli {
    /// Database URL (overrides SOMNI_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a somni config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/somni")]
        db_url: String,
        /// Chat completions endpoint
        #[arg(long, default_value = ModelConfig::DEFAULT_API_URL)]
        model_api_url: String,
        /// Model name
        #[arg(long, default_value = ModelConfig::DEFAULT_MODEL)]
        model: String,
        /// API key for the model endpoint
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the somni database (requires config file or env vars)
    DbInit,
    /// Register a child
    ChildAdd {
        /// Display name
        #[arg(long)]
        name: String,
        /// Birthdate (YYYY-MM-DD)
        #[arg(long)]
        birthdate: Option<NaiveDate>,
        /// JSON file with intake-survey answers
        #[arg(long)]
        survey_file: Option<PathBuf>,
    },
    /// Replace a child's stored survey answers
    Survey {
        /// Child ID
        child_id: String,
        /// JSON file with intake-survey answers
        file: PathBuf,
    },
    /// Generate a plan for a child and print the result as JSON
    Generate(GenerateArgs),
    /// List saved plans for a child
    Plans {
        /// Child ID
        child_id: String,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `somni init` command: write config file.
fn cmd_init(
    db_url: &str,
    model_api_url: &str,
    model: &str,
    api_key: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        model: config::ModelSection {
            api_url: model_api_url.to_string(),
            name: model.to_string(),
            api_key: api_key.map(str::to_string),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  model.api_url = {model_api_url}");
    println!("  model.name = {model}");
    if api_key.is_some() {
        println!("  model.api_key = (set)");
    }
    println!();
    println!("Next: run `somni db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `somni db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &SomniConfig) -> anyhow::Result<()> {
    println!("Initializing somni database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("somni db-init complete.");
    Ok(())
}

fn resolve_db_only(database_url: Option<&str>) -> SomniConfig {
    SomniConfig::resolve(&CliOverrides {
        database_url,
        model: None,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `generate` output on stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            model_api_url,
            model,
            api_key,
            force,
        } => {
            cmd_init(&db_url, &model_api_url, &model, api_key.as_deref(), force)?;
        }
        Commands::DbInit => {
            let resolved = resolve_db_only(cli.database_url.as_deref());
            cmd_db_init(&resolved).await?;
        }
        Commands::ChildAdd {
            name,
            birthdate,
            survey_file,
        } => {
            let resolved = resolve_db_only(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                children_cmd::run_child_add(&db_pool, &name, birthdate, survey_file.as_deref())
                    .await;
            db_pool.close().await;
            result?;
        }
        Commands::Survey { child_id, file } => {
            let resolved = resolve_db_only(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = children_cmd::run_survey(&db_pool, &child_id, &file).await;
            db_pool.close().await;
            result?;
        }
        Commands::Generate(args) => {
            let resolved = SomniConfig::resolve(&CliOverrides {
                database_url: cli.database_url.as_deref(),
                model: args.model.as_deref(),
            });
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = generate_cmd::run_generate(&db_pool, &resolved, &args).await;
            db_pool.close().await;
            if !result? {
                std::process::exit(1);
            }
        }
        Commands::Plans { child_id } => {
            let resolved = resolve_db_only(cli.database_url.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plans_cmd::run_plans(&db_pool, &child_id).await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "somni", &mut std::io::stdout());
        }
    }

    Ok(())
}

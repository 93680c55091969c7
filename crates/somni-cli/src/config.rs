//! Configuration file management for somni.
//!
//! Provides a TOML-based config file at `~/.config/somni/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use somni_core::EngineConfig;
use somni_core::model::ModelConfig;
use somni_core::model::openai::{API_KEY_ENV, API_URL_ENV, MODEL_ENV};
use somni_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub model: ModelSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Chat completions endpoint.
    pub api_url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the somni config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/somni` or `~/.config/somni`,
/// never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("somni");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("somni")
}

/// Return the path to the somni config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Write the config file to its default location.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// The file holds an API key, so it is restricted to 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Flags that take precedence over everything else.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides<'a> {
    pub database_url: Option<&'a str>,
    pub model: Option<&'a str>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct SomniConfig {
    pub db_config: DbConfig,
    pub model_config: ModelConfig,
    pub engine_config: EngineConfig,
}

impl SomniConfig {
    /// Resolve configuration from the process environment and the config
    /// file, if one exists.
    pub fn resolve(cli: &CliOverrides<'_>) -> Self {
        let file = load_config().ok();
        Self::resolve_with(cli, |key| std::env::var(key).ok(), file.as_ref())
    }

    /// Resolve with an explicit env lookup and config file.
    ///
    /// - DB URL: flag > `SOMNI_DATABASE_URL` > `database.url` > default
    /// - Model name: flag > `SOMNI_MODEL_NAME` > `model.name` > default
    /// - Model URL: `SOMNI_MODEL_API_URL` > `model.api_url` > default
    /// - API key: `SOMNI_MODEL_API_KEY` > `model.api_key` > none
    /// - Engine tunables: env only (`SOMNI_PLAN_*`)
    pub fn resolve_with(
        cli: &CliOverrides<'_>,
        lookup: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Self {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_url = cli
            .database_url
            .map(str::to_owned)
            .or_else(|| env(DbConfig::URL_ENV))
            .or_else(|| file.map(|f| f.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let defaults = ModelConfig::default();
        let model_section = file.map(|f| &f.model);
        let model_config = ModelConfig {
            api_url: env(API_URL_ENV)
                .or_else(|| model_section.map(|m| m.api_url.clone()))
                .unwrap_or(defaults.api_url),
            model: cli
                .model
                .map(str::to_owned)
                .or_else(|| env(MODEL_ENV))
                .or_else(|| model_section.map(|m| m.name.clone()))
                .unwrap_or(defaults.model),
            api_key: env(API_KEY_ENV).or_else(|| model_section.and_then(|m| m.api_key.clone())),
            timeout: defaults.timeout,
        };

        Self {
            db_config: DbConfig::new(db_url),
            model_config,
            engine_config: EngineConfig::from_lookup(&lookup),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_string(),
            },
            model: ModelSection {
                api_url: "http://file-llm:8080/v1/chat/completions".to_string(),
                name: "file-model".to_string(),
                api_key: Some("sk-file".to_string()),
            },
        }
    }

    fn env(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("somni").join("config.toml");

        save_config_to(&path, &file()).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, file());
    }

    #[test]
    fn api_key_is_optional_in_file() {
        let parsed: ConfigFile = toml::from_str(
            "[database]\nurl = \"postgresql://h/db\"\n\n[model]\napi_url = \"http://x\"\nname = \"m\"\n",
        )
        .unwrap();
        assert!(parsed.model.api_key.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&path, &file()).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn cli_flags_override_all() {
        let cli = CliOverrides {
            database_url: Some("postgresql://cli:5432/clidb"),
            model: Some("cli-model"),
        };
        let lookup = env(&[
            ("SOMNI_DATABASE_URL", "postgresql://env:5432/envdb"),
            ("SOMNI_MODEL_NAME", "env-model"),
        ]);
        let config = SomniConfig::resolve_with(&cli, lookup, Some(&file()));
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
        assert_eq!(config.model_config.model, "cli-model");
    }

    #[test]
    fn env_overrides_config_file() {
        let lookup = env(&[
            ("SOMNI_DATABASE_URL", "postgresql://env:5432/envdb"),
            ("SOMNI_MODEL_API_KEY", "sk-env"),
            ("SOMNI_PLAN_MIN_EVENTS", "3"),
        ]);
        let config = SomniConfig::resolve_with(&CliOverrides::default(), lookup, Some(&file()));
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.model_config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.model_config.model, "file-model");
        assert_eq!(config.engine_config.min_events, 3);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let config = SomniConfig::resolve_with(&CliOverrides::default(), env(&[]), Some(&file()));
        assert_eq!(config.db_config.database_url, "postgresql://filehost:5432/filedb");
        assert_eq!(
            config.model_config.api_url,
            "http://file-llm:8080/v1/chat/completions"
        );
        assert_eq!(config.model_config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = SomniConfig::resolve_with(&CliOverrides::default(), env(&[]), None);
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.model_config, ModelConfig::default());
        assert_eq!(config.engine_config, EngineConfig::default());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("somni/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}

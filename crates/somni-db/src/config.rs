use std::env;

/// Database configuration.
///
/// Reads from the `SOMNI_DATABASE_URL` environment variable, falling back to
/// `postgresql://localhost:5432/somni` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/somni";

    /// Environment variable holding the connection URL.
    pub const URL_ENV: &str = "SOMNI_DATABASE_URL";

    /// Build a config from the environment.
    ///
    /// Priority: `SOMNI_DATABASE_URL` env var, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Database name from the URL path, without query parameters.
    ///
    /// Returns `None` when the URL names no database (`postgres://host:5432`
    /// or a trailing `/`).
    pub fn database_name(&self) -> Option<&str> {
        self.split_url().1
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host, keeping credentials and query parameters such as
    /// `sslmode`. Used to issue `CREATE DATABASE` when the target DB does
    /// not yet exist.
    pub fn maintenance_url(&self) -> String {
        let (server, _, query) = self.split_url();
        match query {
            Some(query) => format!("{server}/postgres?{query}"),
            None => format!("{server}/postgres"),
        }
    }

    /// Split into `scheme://authority`, database name, and query string.
    fn split_url(&self) -> (&str, Option<&str>, Option<&str>) {
        let (rest, query) = match self.database_url.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (self.database_url.as_str(), None),
        };
        let authority_start = rest.find("://").map_or(0, |i| i + 3);
        match rest[authority_start..].find('/') {
            Some(offset) => {
                let slash = authority_start + offset;
                let name = Some(&rest[slash + 1..]).filter(|s| !s.is_empty());
                (&rest[..slash], name, query)
            }
            None => (rest, None, query),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

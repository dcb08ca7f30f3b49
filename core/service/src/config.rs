use clap::{Parser, ValueEnum};
use client_console_sync::DEFAULT_PAGE_SIZE;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Local SQLite file
    Sqlite,
    /// PostgREST-compatible HTTP endpoint
    Rest,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddr(String),

    #[error("CONSOLE_REST_URL is required when CONSOLE_STORE=rest")]
    MissingRestUrl,

    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("no database path given and HOME is not set")]
    NoDatabasePath,
}

/// Service settings, from command-line flags or the environment
#[derive(Debug, Clone, Parser)]
#[command(name = "client-console", version, about = "Client Console HTTP service")]
pub struct ServiceConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "CONSOLE_BIND_ADDR", default_value = "127.0.0.1:21960")]
    pub bind_addr: String,

    /// Backing store
    #[arg(long, env = "CONSOLE_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite database file
    #[arg(long, env = "CONSOLE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Base URL of the REST store
    #[arg(long, env = "CONSOLE_REST_URL")]
    pub rest_url: Option<String>,

    /// API key sent to the REST store
    #[arg(long, env = "CONSOLE_REST_KEY", hide_env_values = true)]
    pub rest_key: Option<String>,

    /// Directory rows per page
    #[arg(long, env = "CONSOLE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

impl ServiceConfig {
    /// Check settings that clap cannot check on its own
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        let addr = self
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(self.bind_addr.clone()))?;

        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        if self.store == StoreKind::Rest
            && self.rest_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MissingRestUrl);
        }
        Ok(addr)
    }

    /// Configured database file, or the default under `$HOME`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.db_path {
            return Ok(path.clone());
        }
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoDatabasePath)?;
        Ok(PathBuf::from(home).join(".local/share/client-console/console.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["client-console"];
        argv.extend_from_slice(args);
        ServiceConfig::parse_from(argv)
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--bind-addr",
            "0.0.0.0:8080",
            "--db-path",
            "/tmp/console.db",
            "--page-size",
            "25",
        ]);
        assert_eq!(config.validate().unwrap().port(), 8080);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/console.db"));
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_rest_store_requires_url() {
        let config = parse(&["--store", "rest", "--bind-addr", "127.0.0.1:1"]);
        assert_eq!(config.validate(), Err(ConfigError::MissingRestUrl));

        let config = parse(&[
            "--store",
            "rest",
            "--bind-addr",
            "127.0.0.1:1",
            "--rest-url",
            "https://db.example.test",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = parse(&["--bind-addr", "not an address"]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBindAddr(_))));

        let config = parse(&["--bind-addr", "127.0.0.1:1", "--page-size", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPageSize));
    }
}

//! Process settings from the environment (and `.env`), plus tracing setup.

use crate::error::ConfigError;
use std::net::SocketAddr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "lingua_crud=info";

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// `None` selects in-memory repositories.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub body_limit_bytes: usize,
    pub log_filter: String,
}

impl Settings {
    /// Loads `.env` if present, then reads `DATABASE_URL`, `BIND_ADDR`,
    /// `DB_MAX_CONNECTIONS`, `BODY_LIMIT_BYTES` and `RUST_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR.parse().ok())?;
        let db_max_connections = parse("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), Some(DEFAULT_DB_MAX_CONNECTIONS))?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let body_limit_bytes = parse("BODY_LIMIT_BYTES", get("BODY_LIMIT_BYTES"), Some(DEFAULT_BODY_LIMIT_BYTES))?;

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr,
            db_max_connections,
            body_limit_bytes,
            log_filter: get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Installs the global `tracing` subscriber. Safe to call more than once.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.log_filter)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

fn parse<T>(key: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => default.ok_or_else(|| ConfigError::Load(format!("{key} has no default"))),
    }
}

//! Runtime configuration, read from the environment (and `.env` when present).

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Absent means domain events are dropped.
    pub nats_url: Option<String>,
    pub event_subject_prefix: String,
    /// New listings are visible without admin approval.
    pub auto_approve_products: bool,
    pub seed_demo_accounts: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            host: non_empty("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&non_empty, "PORT", 8083)?,
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parsed(&non_empty, "DB_MAX_CONNECTIONS", 10)?,
            nats_url: non_empty("NATS_URL"),
            event_subject_prefix: non_empty("EVENT_SUBJECT_PREFIX").unwrap_or_else(|| "market".to_string()),
            auto_approve_products: parsed(&non_empty, "AUTO_APPROVE_PRODUCTS", true)?,
            seed_demo_accounts: parsed(&non_empty, "SEED_DEMO_ACCOUNTS", false)?,
        })
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

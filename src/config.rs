// ==================== CONFIGURATION ====================
// Read once at process start from the environment (.env supported via dotenv).
// No hot reload: store handles are built from this and live for the process.

use crate::database::{FailoverPolicy, StoreKind};
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    /// Multi-document transactions for cascades (requires a replica set)
    pub transactions: bool,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostgresSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub primary: StoreKind,
    pub failover_policy: FailoverPolicy,
    pub probe_timeout: Duration,
    pub mongo: MongoSettings,
    pub postgres: PostgresSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse from any key lookup (tests pass a map instead of touching the process env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let primary = match get("DATABASE_PRIMARY") {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid {
                key: "DATABASE_PRIMARY",
                message,
            })?,
            None => StoreKind::Mongo,
        };

        let failover_policy = match get("FAILOVER_POLICY") {
            Some(v) => v.parse().map_err(|message| ConfigError::Invalid {
                key: "FAILOVER_POLICY",
                message,
            })?,
            None => FailoverPolicy::PrimaryOnly,
        };

        let probe_timeout_ms: u64 = parse_number(&get, "HEALTH_PROBE_TIMEOUT_MS", 2000)?;

        let mongo = MongoSettings {
            uri: get("MONGODB_URI").unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            database: get("MONGODB_DATABASE").unwrap_or_else(|| "cleaning_service".to_string()),
            transactions: parse_bool(&get, "MONGODB_TRANSACTIONS", false)?,
            max_pool_size: parse_number(&get, "MONGODB_MAX_POOL_SIZE", 20)?,
        };

        let postgres = PostgresSettings {
            url: get("POSTGRES_URL")
                .or_else(|| get("DATABASE_URL"))
                .ok_or(ConfigError::Missing("POSTGRES_URL (or DATABASE_URL)"))?,
            max_connections: parse_number(&get, "POSTGRES_MAX_CONNECTIONS", 5)?,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&get, "PORT", 3002)?,
            database: DatabaseConfig {
                primary,
                failover_policy,
                probe_timeout: Duration::from_millis(probe_timeout_ms),
                mongo,
                postgres,
            },
        })
    }
}

fn parse_number<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()) {
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                message: format!("expected a boolean, got '{}'", v),
            }),
        },
        None => Ok(default),
    }
}

//! Configuration loading and representation.
//!
//! All settings come from environment variables. Missing values fall back to
//! defaults (with a warning where the default matters in production);
//! malformed values are an error.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

const DEFAULT_PORT: u16 = 8082;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_DB_CONNECT_RETRIES: u32 = 10;
const DEFAULT_PRODUCT_SERVICE_URL: &str = "http://product-service:8081";
const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CATALOG_MAX_CONCURRENCY: usize = 8;
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Postgres connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub connect: PgConnectOptions,
    pub max_connections: u32,
    pub connect_retries: u32,
}

/// Catalog (product service) client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_concurrent_lookups: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `None` runs the service on in-memory storage (dev mode).
    pub database: Option<DatabaseConfig>,
    pub catalog: CatalogConfig,
    pub low_stock_threshold: i32,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;

        let database = match connect_options(&get)? {
            Some(connect) => Some(DatabaseConfig {
                connect,
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                connect_retries: parse_or(&get, "DB_CONNECT_RETRIES", DEFAULT_DB_CONNECT_RETRIES)?,
            }),
            None => {
                tracing::warn!("no database configured; using in-memory storage");
                None
            }
        };

        let base_url = get("PRODUCT_SERVICE_URL").unwrap_or_else(|| {
            tracing::warn!(
                default = DEFAULT_PRODUCT_SERVICE_URL,
                "PRODUCT_SERVICE_URL not set; using default"
            );
            DEFAULT_PRODUCT_SERVICE_URL.to_string()
        });

        let timeout_secs: u64 = parse_or(&get, "CATALOG_TIMEOUT_SECS", DEFAULT_CATALOG_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "CATALOG_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let max_concurrent_lookups: usize =
            parse_or(&get, "CATALOG_MAX_CONCURRENCY", DEFAULT_CATALOG_MAX_CONCURRENCY)?;
        if max_concurrent_lookups == 0 {
            return Err(ConfigError::Invalid {
                key: "CATALOG_MAX_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port,
            database,
            catalog: CatalogConfig {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                max_concurrent_lookups,
            },
            low_stock_threshold: parse_or(&get, "LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?,
        })
    }
}

/// `DATABASE_URL` wins; otherwise build from the `DB_*` parts if any is set.
///
/// Parts are set field by field, so reserved URL characters in a password
/// need no escaping.
fn connect_options(
    get: &impl Fn(&str) -> Option<String>,
) -> Result<Option<PgConnectOptions>, ConfigError> {
    if let Some(url) = get("DATABASE_URL") {
        return url
            .parse::<PgConnectOptions>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: "DATABASE_URL",
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            });
    }

    let host = get("DB_HOST");
    let user = get("DB_USER");
    let dbname = get("DB_NAME");
    if host.is_none() && user.is_none() && dbname.is_none() {
        return Ok(None);
    }

    let port: u16 = parse_or(get, "DB_PORT", DEFAULT_DB_PORT)?;
    let ssl_mode: PgSslMode = match get("DB_SSLMODE") {
        Some(raw) => raw.trim().parse().map_err(|e: sqlx::Error| ConfigError::Invalid {
            key: "DB_SSLMODE",
            value: raw.clone(),
            reason: e.to_string(),
        })?,
        None => PgSslMode::Disable,
    };

    let mut options = PgConnectOptions::new_without_pgpass()
        .host(host.as_deref().unwrap_or(DEFAULT_DB_HOST))
        .port(port)
        .ssl_mode(ssl_mode);
    if let Some(user) = user {
        options = options.username(&user);
    }
    if let Some(dbname) = dbname {
        options = options.database(&dbname);
    }
    if let Some(password) = get("DB_PASSWORD") {
        options = options.password(&password);
    }
    Ok(Some(options))
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

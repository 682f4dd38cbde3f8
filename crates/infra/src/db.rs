//! Database adapters: connection pool construction, schema, health.
//!
//! The pool is built once at start-up and handed to every store that needs
//! it. Stores acquire a connection per unit of work (`pool.begin()`), which is
//! released on commit or rollback.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Build the process-wide pool and wait until the database answers.
///
/// Retries the initial ping `connect_retries` times, two seconds apart.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .max_lifetime(MAX_CONNECTION_LIFETIME)
        .connect_lazy_with(config.connect.clone());

    let attempts = config.connect_retries.max(1);
    let mut attempt = 1;
    loop {
        match ping(&pool).await {
            Ok(()) => {
                tracing::info!(attempt, host = config.connect.get_host(), "database connected");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, max_attempts = attempts, error = %e, "database ping failed; retrying");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "database unreachable; giving up");
                return Err(e);
            }
        }
    }
}

/// Apply the bundled, idempotent schema.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Round-trip a trivial query.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

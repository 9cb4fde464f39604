//! Persistence binding.
//!
//! The dispatcher never issues queries. It opens one SQLite pool at startup
//! and hands it to handlers through their invocation context.

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid database url {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Database handle with connection pool.
#[derive(Clone, Debug)]
pub struct Persistence {
    pool: SqlitePool,
}

impl Persistence {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

    /// Open the pool for `url` and check that a connection can be made.
    pub async fn bind(url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|source| PersistenceError::Url {
                url: url.to_string(),
                source,
            })?
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one and never let it idle out.
        let in_memory = url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout((!in_memory).then_some(Self::IDLE_TIMEOUT))
            .max_lifetime((!in_memory).then_some(Self::MAX_LIFETIME))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        info!(url = %url, "Database connected");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

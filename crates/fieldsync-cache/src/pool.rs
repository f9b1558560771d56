//! SQLite connection pool
//!
//! [`DatabasePool`] owns the `SqlitePool` shared by the local store, the
//! mutation queue and the audit log. Opening it applies the embedded schema,
//! so callers never see a database without tables.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use fieldsync_core::config::DatabaseConfig;

use crate::CacheError;

/// Write contention with the UI process is resolved by waiting, not failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_FILE_CONNECTIONS: u32 = 5;

const INITIAL_SCHEMA: &str = include_str!("migrations/20261018_initial.sql");

/// Pool of SQLite connections to the local datastore
///
/// File databases use WAL journaling so the uploader can read while another
/// writer commits. In-memory databases are limited to a single connection,
/// because each SQLite in-memory connection is a separate database.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or file cannot be
    /// created or opened, `CacheError::MigrationFailed` if the schema cannot
    /// be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_FILE_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::apply_schema(&pool).await?;
        tracing::info!(path = %db_path.display(), "Database opened");

        Ok(Self { pool })
    }

    /// Opens the database configured in the `database` section
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, CacheError> {
        Self::new(&config.path).await
    }

    /// Creates a private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::apply_schema(&pool).await?;
        tracing::debug!("In-memory database ready");

        Ok(Self { pool })
    }

    /// Returns the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(INITIAL_SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("Failed to apply schema: {}", e)))?;

        tracing::debug!("Database schema applied");
        Ok(())
    }
}

//! FieldSync Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - Local entity records with their assigned server ids and last-synced
//!   snapshots
//! - The queue of pending mutation transactions
//! - The audit log of submission outcomes
//!
//! ## Architecture
//!
//! This crate implements the `ILocalStore`, `IMutationSource` and
//! `IAuditRepository` ports from `fieldsync-core` using SQLite as the storage
//! backend. It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with embedded schema
//! - [`SqliteStore`] - Implementation of the three storage ports
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use fieldsync_cache::{DatabasePool, SqliteStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/fieldsync/fieldsync.db")).await?;
//! let store = SqliteStore::new(pool.pool().clone());
//! // Use store as ILocalStore, IMutationSource and IAuditRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Applying the schema failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted to or from its domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

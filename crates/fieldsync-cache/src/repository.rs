//! SQLite implementation of the local store, mutation queue and audit log
//!
//! [`SqliteStore`] implements three ports of `fieldsync-core` over one pool:
//! [`ILocalStore`], [`IMutationSource`] and [`IAuditRepository`].
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                        |
//! |-------------------|----------|-------------------------------------------------|
//! | LocalId           | TEXT     | `Display` / `FromStr` (integer or UUID string)  |
//! | BatchId, AuditId  | INTEGER  | rowid                                           |
//! | FieldMap, Value   | TEXT     | serde_json serialization                        |
//! | OperationKind     | TEXT     | `as_str()` / `FromStr`                          |
//! | OutcomeKind       | TEXT     | `as_str()` / `FromStr`                          |
//! | DateTime<Utc>     | TEXT     | RFC 3339, UTC, fixed microsecond precision      |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use fieldsync_core::domain::{
    AuditEntry, AuditId, BatchId, FieldMap, LocalId, LocalRecord, OperationKind, OutcomeKind,
    PendingOperation, Transaction,
};
use fieldsync_core::ports::{IAuditRepository, ILocalStore, IMutationSource};

use crate::CacheError;

/// SQLite-backed local datastore
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Commits a local transaction to the mutation queue
    ///
    /// Operations keep the given order. An empty slice is rejected, since an
    /// empty transaction would never carry anything to submit.
    pub async fn enqueue(&self, operations: &[PendingOperation]) -> Result<BatchId, CacheError> {
        if operations.is_empty() {
            return Err(CacheError::QueryFailed(
                "Refusing to enqueue an empty transaction".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO pending_transactions (created_at) VALUES (?)")
            .bind(timestamp_to_string(Utc::now()))
            .execute(&mut *tx)
            .await?;
        let batch_id = result.last_insert_rowid();

        for (seq, op) in operations.iter().enumerate() {
            sqlx::query(
                "INSERT INTO pending_operations \
                 (transaction_id, seq, kind, entity_type, local_id, data) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(batch_id)
            .bind(seq as i64)
            .bind(op.kind().as_str())
            .bind(op.entity_type())
            .bind(op.local_id().to_string())
            .bind(fields_to_string(op.data())?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(batch_id, operations = operations.len(), "Enqueued transaction");
        Ok(BatchId::new(batch_id))
    }

    /// Number of attempts recorded for a queued transaction
    pub async fn attempts(&self, id: BatchId) -> Result<Option<u32>, CacheError> {
        let attempts: Option<i64> =
            sqlx::query_scalar("SELECT attempts FROM pending_transactions WHERE id = ?")
                .bind(id.value())
                .fetch_optional(&self.pool)
                .await?;
        Ok(attempts.map(|a| a as u32))
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Fixed-width UTC form, so stored timestamps sort lexicographically
fn timestamp_to_string(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("Invalid timestamp '{}': {}", s, e)))
}

fn fields_to_string(fields: &FieldMap) -> Result<String, CacheError> {
    serde_json::to_string(fields)
        .map_err(|e| CacheError::SerializationError(format!("Failed to serialize fields: {}", e)))
}

fn parse_fields(s: &str) -> Result<FieldMap, CacheError> {
    serde_json::from_str(s)
        .map_err(|e| CacheError::SerializationError(format!("Invalid field map: {}", e)))
}

fn parse_local_id(s: &str) -> Result<LocalId, CacheError> {
    LocalId::from_str(s)
        .map_err(|e| CacheError::SerializationError(format!("Invalid local id '{}': {}", s, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<LocalRecord, CacheError> {
    let entity_type: String = row.try_get("entity_type")?;
    let local_id: String = row.try_get("local_id")?;
    let server_id: Option<i64> = row.try_get("server_id")?;
    let data: String = row.try_get("data")?;
    let synced_data: Option<String> = row.try_get("synced_data")?;

    let mut record = LocalRecord::new(entity_type, parse_local_id(&local_id)?, parse_fields(&data)?);
    if let Some(server_id) = server_id {
        record = record.with_server_id(server_id);
    }
    if let Some(synced) = synced_data {
        record = record.with_synced_data(parse_fields(&synced)?);
    }
    Ok(record)
}

fn operation_from_row(row: &SqliteRow) -> Result<PendingOperation, CacheError> {
    let kind: String = row.try_get("kind")?;
    let entity_type: String = row.try_get("entity_type")?;
    let local_id: String = row.try_get("local_id")?;
    let data: String = row.try_get("data")?;

    let kind = OperationKind::from_str(&kind)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;

    Ok(PendingOperation::new(
        kind,
        entity_type,
        parse_local_id(&local_id)?,
        parse_fields(&data)?,
    ))
}

fn audit_entry_from_row(row: &SqliteRow) -> Result<AuditEntry, CacheError> {
    let id: i64 = row.try_get("id")?;
    let entity_type: String = row.try_get("entity_type")?;
    let entity_id: String = row.try_get("entity_id")?;
    let kind: String = row.try_get("kind")?;
    let message: String = row.try_get("message")?;
    let details: String = row.try_get("details")?;
    let created_at: String = row.try_get("created_at")?;
    let last_seen_at: String = row.try_get("last_seen_at")?;
    let retry_count: i64 = row.try_get("retry_count")?;

    let kind =
        OutcomeKind::from_str(&kind).map_err(|e| CacheError::SerializationError(e.to_string()))?;
    let details = serde_json::from_str(&details)
        .map_err(|e| CacheError::SerializationError(format!("Invalid audit details: {}", e)))?;

    Ok(AuditEntry::new(entity_type, entity_id, kind, message)
        .with_id(AuditId::new(id))
        .with_details(details)
        .with_timestamps(parse_datetime(&created_at)?, parse_datetime(&last_seen_at)?)
        .with_retry_count(u32::try_from(retry_count).unwrap_or(u32::MAX)))
}

/// WHERE fragment matching a record by key or by assigned server id
///
/// Binds: entity_type, local_id text, server id (NULL for temporary ids).
const MATCH_RECORD: &str = "entity_type = ? AND (local_id = ? OR (? IS NOT NULL AND server_id = ?))";

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteStore {
    async fn get_record(
        &self,
        entity_type: &str,
        local_id: &LocalId,
    ) -> anyhow::Result<Option<LocalRecord>> {
        let server_id = local_id.server_id();
        let row = sqlx::query(&format!(
            "SELECT * FROM records WHERE {MATCH_RECORD} ORDER BY local_id = ? DESC LIMIT 1"
        ))
        .bind(entity_type)
        .bind(local_id.to_string())
        .bind(server_id)
        .bind(server_id)
        .bind(local_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put_record(&self, record: &LocalRecord) -> anyhow::Result<()> {
        let synced = record.synced_data().map(fields_to_string).transpose()?;

        // Sync bookkeeping survives a rewrite that does not carry it
        sqlx::query(
            "INSERT INTO records (entity_type, local_id, server_id, data, synced_data, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(entity_type, local_id) DO UPDATE SET \
               server_id = COALESCE(excluded.server_id, records.server_id), \
               data = excluded.data, \
               synced_data = COALESCE(excluded.synced_data, records.synced_data), \
               updated_at = excluded.updated_at",
        )
        .bind(record.entity_type())
        .bind(record.local_id().to_string())
        .bind(record.server_id())
        .bind(fields_to_string(record.data())?)
        .bind(&synced)
        .bind(timestamp_to_string(Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(entity_type = record.entity_type(), local_id = %record.local_id(), "Saved record");
        Ok(())
    }

    async fn find_server_id(
        &self,
        entity_type: &str,
        temp_id: &Uuid,
    ) -> anyhow::Result<Option<i64>> {
        let server_id: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT server_id FROM records WHERE entity_type = ? AND local_id = ?",
        )
        .bind(entity_type)
        .bind(temp_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(server_id.flatten())
    }

    async fn assign_server_id(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        server_id: i64,
    ) -> anyhow::Result<()> {
        // A create whose local row is already gone still needs the mapping
        // for references later in the queue.
        sqlx::query(
            "INSERT INTO records (entity_type, local_id, server_id, data, updated_at) \
             VALUES (?, ?, ?, '{}', ?) \
             ON CONFLICT(entity_type, local_id) DO UPDATE SET \
               server_id = excluded.server_id, \
               updated_at = excluded.updated_at",
        )
        .bind(entity_type)
        .bind(local_id.to_string())
        .bind(server_id)
        .bind(timestamp_to_string(Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(entity_type, local_id = %local_id, server_id, "Assigned server id");
        Ok(())
    }

    async fn mark_synced(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        acknowledged: &FieldMap,
    ) -> anyhow::Result<()> {
        let server_id = local_id.server_id();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT local_id, synced_data FROM records WHERE {MATCH_RECORD}"
        ))
        .bind(entity_type)
        .bind(local_id.to_string())
        .bind(server_id)
        .bind(server_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tracing::debug!(entity_type, local_id = %local_id, "No local row to mark synced");
            return Ok(());
        };

        let key: String = row.try_get("local_id")?;
        let current: Option<String> = row.try_get("synced_data")?;
        let mut snapshot = match current {
            Some(ref s) => parse_fields(s)?,
            None => FieldMap::new(),
        };
        for (name, value) in acknowledged {
            snapshot.insert(name.clone(), value.clone());
        }

        sqlx::query("UPDATE records SET synced_data = ? WHERE entity_type = ? AND local_id = ?")
            .bind(fields_to_string(&snapshot)?)
            .bind(entity_type)
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record(&self, entity_type: &str, local_id: &LocalId) -> anyhow::Result<bool> {
        let server_id = local_id.server_id();
        let result = sqlx::query(&format!("DELETE FROM records WHERE {MATCH_RECORD}"))
            .bind(entity_type)
            .bind(local_id.to_string())
            .bind(server_id)
            .bind(server_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        tracing::trace!(entity_type, local_id = %local_id, removed, "Deleted record");
        Ok(removed)
    }
}

// ============================================================================
// IMutationSource implementation
// ============================================================================

#[async_trait::async_trait]
impl IMutationSource for SqliteStore {
    async fn next_batch(&self) -> anyhow::Result<Option<Transaction>> {
        let batch_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM pending_transactions ORDER BY id ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        let Some(batch_id) = batch_id else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT * FROM pending_operations WHERE transaction_id = ? ORDER BY seq ASC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in &rows {
            operations.push(operation_from_row(row)?);
        }

        Ok(Some(Transaction::new(BatchId::new(batch_id), operations)))
    }

    async fn complete_batch(&self, id: BatchId) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pending_operations WHERE transaction_id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM pending_transactions WHERE id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(batch_id = %id, "Removed completed transaction");
        Ok(())
    }

    async fn record_attempt(&self, id: BatchId) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE pending_transactions \
             SET attempts = attempts + 1, last_attempt_at = ? WHERE id = ?",
        )
        .bind(timestamp_to_string(Utc::now()))
        .bind(id.value())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ============================================================================
// IAuditRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl IAuditRepository for SqliteStore {
    async fn append(&self, entry: &AuditEntry) -> anyhow::Result<AuditEntry> {
        let details = serde_json::to_string(entry.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit details: {}", e))?;

        let result = sqlx::query(
            "INSERT INTO audit_log \
             (entity_type, entity_id, kind, message, details, created_at, last_seen_at, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.entity_type())
        .bind(entry.entity_id())
        .bind(entry.kind().as_str())
        .bind(entry.message())
        .bind(&details)
        .bind(timestamp_to_string(entry.created_at()))
        .bind(timestamp_to_string(entry.last_seen_at()))
        .bind(i64::from(entry.retry_count()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(kind = %entry.kind(), entity_type = entry.entity_type(), "Appended audit entry");
        Ok(entry.clone().with_id(AuditId::new(result.last_insert_rowid())))
    }

    async fn upsert_failure(&self, entry: &AuditEntry) -> anyhow::Result<AuditEntry> {
        if !entry.kind().is_failure() {
            anyhow::bail!("Only failure outcomes are deduplicated, got {}", entry.kind());
        }

        let details = serde_json::to_string(entry.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize audit details: {}", e))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO audit_log \
             (entity_type, entity_id, kind, message, details, created_at, last_seen_at, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1) \
             ON CONFLICT(entity_type, entity_id, kind) WHERE kind != 'success' DO UPDATE SET \
               retry_count = audit_log.retry_count + 1, \
               last_seen_at = excluded.last_seen_at, \
               message = excluded.message, \
               details = excluded.details",
        )
        .bind(entry.entity_type())
        .bind(entry.entity_id())
        .bind(entry.kind().as_str())
        .bind(entry.message())
        .bind(&details)
        .bind(timestamp_to_string(entry.created_at()))
        .bind(timestamp_to_string(entry.last_seen_at()))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT * FROM audit_log WHERE entity_type = ? AND entity_id = ? AND kind = ?",
        )
        .bind(entry.entity_type())
        .bind(entry.entity_id())
        .bind(entry.kind().as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let stored = audit_entry_from_row(&row)?;
        tracing::trace!(
            kind = %stored.kind(),
            entity_type = stored.entity_type(),
            retry_count = stored.retry_count(),
            "Upserted audit failure"
        );
        Ok(stored)
    }

    async fn entries_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_log WHERE entity_type = ? AND entity_id = ? \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(audit_entry_from_row(row)?);
        }

        Ok(entries)
    }

    async fn recent(&self, since: DateTime<Utc>, limit: u32) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_log WHERE last_seen_at >= ? \
             ORDER BY last_seen_at DESC, id DESC LIMIT ?",
        )
        .bind(timestamp_to_string(since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(audit_entry_from_row(row)?);
        }

        Ok(entries)
    }
}

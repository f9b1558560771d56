//! Audit repository port (driven/secondary port)

use chrono::{DateTime, Utc};

use crate::domain::AuditEntry;

/// Port trait for the local audit log
///
/// Failure entries are unique per `(entity_type, entity_id, kind)`;
/// `upsert_failure` either inserts the entry or refreshes the existing one.
/// Success entries are appended without any uniqueness.
#[async_trait::async_trait]
pub trait IAuditRepository: Send + Sync {
    /// Appends a new entry and returns it with its assigned id
    async fn append(&self, entry: &AuditEntry) -> anyhow::Result<AuditEntry>;

    /// Inserts a failure entry, or bumps `retry_count` and `last_seen_at`
    /// (and replaces message and details) on the entry with the same key.
    ///
    /// Returns the stored entry.
    async fn upsert_failure(&self, entry: &AuditEntry) -> anyhow::Result<AuditEntry>;

    /// All entries for one entity, oldest first
    async fn entries_for(&self, entity_type: &str, entity_id: &str)
        -> anyhow::Result<Vec<AuditEntry>>;

    /// Entries last seen at or after `since`, newest first
    async fn recent(&self, since: DateTime<Utc>, limit: u32) -> anyhow::Result<Vec<AuditEntry>>;
}

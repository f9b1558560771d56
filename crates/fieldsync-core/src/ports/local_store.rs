//! Local store port (driven/secondary port)
//!
//! Basic record access the upload pipeline needs from the local datastore:
//! reading snapshots for diffs, resolving temporary identifiers, and the
//! post-success writes (server id assignment, snapshot refresh, placeholder
//! deletion).

use uuid::Uuid;

use crate::domain::{FieldMap, LocalId, LocalRecord};

/// Port trait for local record access
///
/// ## Implementation Notes
///
/// - Records are keyed by `(entity_type, local_id)`.
/// - A record created offline keeps its temporary identifier as key after a
///   server id is assigned; lookups by the server id must also find it.
/// - `delete_record` is idempotent.
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Retrieves a record by its local identifier or its assigned server id
    async fn get_record(
        &self,
        entity_type: &str,
        local_id: &LocalId,
    ) -> anyhow::Result<Option<LocalRecord>>;

    /// Inserts or replaces a record
    async fn put_record(&self, record: &LocalRecord) -> anyhow::Result<()>;

    /// Looks up the server id for a record created with `temp_id`
    ///
    /// Returns `None` when no such record exists or it was not confirmed yet.
    async fn find_server_id(&self, entity_type: &str, temp_id: &Uuid)
        -> anyhow::Result<Option<i64>>;

    /// Records the server id assigned to a record
    async fn assign_server_id(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        server_id: i64,
    ) -> anyhow::Result<()>;

    /// Merges fields the backend acknowledged into the last-synced snapshot
    ///
    /// Only the acknowledged values move into the snapshot; local edits that
    /// were committed later stay visible to the next diff.
    async fn mark_synced(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        acknowledged: &FieldMap,
    ) -> anyhow::Result<()>;

    /// Deletes a record. Returns whether a row was removed.
    async fn delete_record(&self, entity_type: &str, local_id: &LocalId) -> anyhow::Result<bool>;
}

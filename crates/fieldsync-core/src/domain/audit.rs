//! Audit entry domain entity
//!
//! One [`AuditEntry`] records the outcome of submitting an operation for one
//! entity. Failure entries are keyed by `(entity_type, entity_id, kind)` and
//! updated in place on repetition; success entries are always new rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::AuditId;
use super::outcome::OutcomeKind;

/// An audit log entry for one submission outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Assigned by the database
    id: Option<AuditId>,
    entity_type: String,
    /// Textual form of the local identifier (server id or temporary id)
    entity_id: String,
    kind: OutcomeKind,
    message: String,
    /// Arbitrary structured detail, stored serialized
    details: Value,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    /// Number of times this outcome was observed; always >= 1
    retry_count: u32,
}

impl AuditEntry {
    /// Creates a new audit entry observed once, now
    ///
    /// # Example
    ///
    /// ```
    /// use fieldsync_core::domain::{AuditEntry, OutcomeKind};
    ///
    /// let entry = AuditEntry::new("pallet", "17", OutcomeKind::BusinessRejection, "bin full");
    /// assert_eq!(entry.retry_count(), 1);
    /// assert!(entry.id().is_none());
    /// ```
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        kind: OutcomeKind,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            kind,
            message: message.into(),
            details: Value::Null,
            created_at: now,
            last_seen_at: now,
            retry_count: 1,
        }
    }

    pub fn id(&self) -> Option<AuditId> {
        self.id
    }

    /// Sets the ID for this audit entry (typically called after database insert)
    pub fn with_id(mut self, id: AuditId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Value {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns true if this entry takes part in deduplication
    pub fn is_deduplicated(&self) -> bool {
        self.kind.is_failure()
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Restores timestamps read from storage
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, last_seen_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.last_seen_at = last_seen_at;
        self
    }

    /// Restores the retry counter read from storage; clamped to at least 1
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.max(1);
        self
    }
}

//! AuditLogger - high-level audit logging service
//!
//! Wraps `IAuditRepository` with one method per submission outcome. Successes
//! are appended; failures go through `upsert_failure`, so the same failure
//! for the same entity keeps a single row with a growing retry count.
//!
//! All logging methods are non-fatal: errors in audit persistence are logged
//! via `tracing::warn!` but never propagated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use fieldsync_core::domain::{AuditEntry, LocalId, OutcomeKind, RemoteOperationResult};
use fieldsync_core::ports::IAuditRepository;

use crate::reason::ReasonCode;

/// High-level audit logger over the audit repository.
pub struct AuditLogger {
    repo: Arc<dyn IAuditRepository>,
}

impl AuditLogger {
    /// Creates a new `AuditLogger` backed by the given repository.
    pub fn new(repo: Arc<dyn IAuditRepository>) -> Self {
        Self { repo }
    }

    async fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.repo.append(&entry).await {
            tracing::warn!(error = %e, entity_type = entry.entity_type(), "Failed to save audit entry");
        }
    }

    async fn upsert(&self, entry: AuditEntry) {
        match self.repo.upsert_failure(&entry).await {
            Ok(stored) if stored.retry_count() > 1 => {
                tracing::debug!(
                    entity_type = stored.entity_type(),
                    entity_id = stored.entity_id(),
                    kind = %stored.kind(),
                    retry_count = stored.retry_count(),
                    "Repeated failure"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, entity_type = entry.entity_type(), "Failed to save audit entry");
            }
        }
    }

    // ========================================================================
    // Outcomes
    // ========================================================================

    /// Log an accepted submission.
    pub async fn log_success(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
        operation: &str,
        server_id: Option<i64>,
    ) {
        let entry = AuditEntry::new(
            entity_type,
            entity_id.to_string(),
            OutcomeKind::Success,
            format!("{operation} accepted"),
        )
        .with_details(json!({
            "operation": operation,
            "server_id": server_id,
        }));
        self.append(entry).await;
    }

    /// Log a submission the backend refused.
    pub async fn log_business_rejection(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
        operation: &str,
        message: &str,
        details: &Value,
    ) {
        let entry = AuditEntry::new(
            entity_type,
            entity_id.to_string(),
            OutcomeKind::BusinessRejection,
            message,
        )
        .with_details(json!({
            "reason": ReasonCode::RemoteRejected,
            "operation": operation,
            "response": details,
        }));
        self.upsert(entry).await;
    }

    /// Log an operation that could not be mapped to a remote call.
    pub async fn log_mapping_gap(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
        reason: ReasonCode,
        message: &str,
    ) {
        let entry =
            AuditEntry::new(entity_type, entity_id.to_string(), OutcomeKind::MappingGap, message)
                .with_details(json!({ "reason": reason }));
        self.upsert(entry).await;
    }

    /// Log a submission that got no authoritative answer.
    pub async fn log_network_failure(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
        operation: &str,
        reason: ReasonCode,
        message: &str,
    ) {
        let entry = AuditEntry::new(
            entity_type,
            entity_id.to_string(),
            OutcomeKind::NetworkFailure,
            message,
        )
        .with_details(json!({
            "reason": reason,
            "operation": operation,
        }));
        self.upsert(entry).await;
    }

    /// Log whatever a submission resolved to.
    pub async fn log_outcome(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
        operation: &str,
        outcome: &RemoteOperationResult,
    ) {
        match outcome {
            RemoteOperationResult::Success { server_id, .. } => {
                self.log_success(entity_type, entity_id, operation, *server_id)
                    .await
            }
            RemoteOperationResult::BusinessRejection { message, details } => {
                self.log_business_rejection(entity_type, entity_id, operation, message, details)
                    .await
            }
            RemoteOperationResult::NetworkFailure { cause, message } => {
                self.log_network_failure(
                    entity_type,
                    entity_id,
                    operation,
                    ReasonCode::from(cause),
                    message,
                )
                .await
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Entries last seen since `since`, newest first.
    pub async fn recent(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        self.repo.recent(since, limit).await
    }

    /// Full history of one entity, oldest first.
    pub async fn history(
        &self,
        entity_type: &str,
        entity_id: &LocalId,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        self.repo
            .entries_for(entity_type, &entity_id.to_string())
            .await
    }
}

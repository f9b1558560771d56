//! Upload engine
//!
//! The [`UploadEngine`] drains the queue of local mutation batches into the
//! remote backend.
//!
//! ## Cycle Flow
//!
//! 1. **Credentials**: exchange the session material for transport
//!    credentials, once per cycle
//! 2. **Batches**: take the oldest queued batch, process its operations in
//!    commit order, and let the [`TransactionFinalizer`] decide whether it
//!    is complete or stays queued
//! 3. **Bookkeeping**: update the [`SyncStatus`](crate::status::SyncStatus)
//!    and return an [`UploadReport`]
//!
//! ## Per-operation Flow
//!
//! classify → resolve identifiers → submit → audit → post-success writes.
//!
//! A server id is assigned as soon as the backend returns it, so later
//! operations of the same batch can reference the new record. Snapshot
//! refreshes and local deletions are held in `PendingWrites` and applied
//! only once the batch completes; an aborted batch is retried against the
//! snapshots it started from.
//!
//! Only a network failure stops a batch. Rejections and mapping gaps are
//! logged to the audit trail and the batch moves on. A local store failure
//! leaves the batch queued and ends the cycle with an error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fieldsync_audit::{AuditLogger, ReasonCode};
use fieldsync_core::config::UploadConfig;
use fieldsync_core::domain::{
    BatchId, ConnectorSession, Credentials, FieldMap, LocalId, LocalRecord, OperationKind,
    PendingOperation, RemoteOperationResult, SessionMaterial, SessionState, Transaction,
};
use fieldsync_core::ports::{IAuditRepository, ILocalStore, IMutationSource, IRemoteBackend};
use fieldsync_mapping::{
    Classification, IdentifierResolver, Intent, IntentMapper, MappedOperation, MappingError,
    MappingRegistry,
};

use crate::finalizer::{BatchSummary, OperationOutcome, Step, TransactionFinalizer};
use crate::status::StatusHandle;
use crate::UploadError;

// ============================================================================
// UploadReport
// ============================================================================

/// Summary of one upload cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Batches removed from the queue
    pub batches_completed: u32,
    /// Batches left queued after a network failure
    pub batches_aborted: u32,
    pub operations_succeeded: u32,
    pub operations_rejected: u32,
    pub operations_skipped: u32,
    pub mapping_gaps: u32,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

impl UploadReport {
    fn add(&mut self, summary: &BatchSummary) {
        if summary.is_complete() {
            self.batches_completed += 1;
        } else {
            self.batches_aborted += 1;
        }
        self.operations_succeeded += summary.succeeded;
        self.operations_rejected += summary.rejected;
        self.operations_skipped += summary.skipped;
        self.mapping_gaps += summary.mapping_gaps;
    }

    /// Batches processed in this cycle, whatever their fate
    pub fn batches_processed(&self) -> u32 {
        self.batches_completed + self.batches_aborted
    }
}

// ============================================================================
// UploadEngine
// ============================================================================

/// Default upper bound of batches per cycle
const DEFAULT_MAX_BATCHES_PER_CYCLE: u32 = 100;

/// Uploads queued local mutations for one connector session
///
/// ## Dependencies
///
/// - `backend`: credential exchange and submission
/// - `store`: local records (snapshots, identifier lookups, post-success writes)
/// - `source`: the queue of pending transactions
/// - `audit`: outcome trail, with failure deduplication
pub struct UploadEngine {
    session: RwLock<ConnectorSession>,
    mapper: IntentMapper,
    resolver: IdentifierResolver,
    backend: Arc<dyn IRemoteBackend>,
    store: Arc<dyn ILocalStore>,
    source: Arc<dyn IMutationSource>,
    audit: AuditLogger,
    status: StatusHandle,
    max_batches_per_cycle: u32,
    /// Serializes cycles: at most one batch is in flight
    cycle_lock: Mutex<()>,
}

impl UploadEngine {
    /// Creates an engine bound to a logged-in session
    pub fn new(
        session: ConnectorSession,
        registry: Arc<MappingRegistry>,
        backend: Arc<dyn IRemoteBackend>,
        store: Arc<dyn ILocalStore>,
        source: Arc<dyn IMutationSource>,
        audit_repository: Arc<dyn IAuditRepository>,
    ) -> Self {
        Self {
            session: RwLock::new(session),
            mapper: IntentMapper::new(registry),
            resolver: IdentifierResolver::new(Arc::clone(&store)),
            backend,
            store,
            source,
            audit: AuditLogger::new(audit_repository),
            status: StatusHandle::new(),
            max_batches_per_cycle: DEFAULT_MAX_BATCHES_PER_CYCLE,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Applies the `upload` configuration section
    pub fn with_upload_config(mut self, config: &UploadConfig) -> Self {
        self.max_batches_per_cycle = config.max_batches_per_cycle.max(1);
        self
    }

    /// Handle to the status indicator, updated after every cycle
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn session_state(&self) -> SessionState {
        match self.session.read() {
            Ok(session) => session.state(),
            Err(poisoned) => poisoned.into_inner().state(),
        }
    }

    /// Ends the session. Later cycles fail with [`UploadError::SessionEnded`].
    pub fn logout(&self) -> Result<(), UploadError> {
        let mut session = match self.session.write() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        };
        session.logout()?;
        info!(session_id = %session.id(), "Connector session ended");
        self.status.update(|s| s.connected = false);
        Ok(())
    }

    fn current_material(&self) -> Result<SessionMaterial, UploadError> {
        let session = match self.session.read() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        };
        session.material().cloned().ok_or(UploadError::SessionEnded)
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Runs one upload cycle
    ///
    /// Does nothing (and contacts nobody) when the queue is empty. Otherwise
    /// exchanges credentials and drains up to `max_batches_per_cycle`
    /// batches, stopping at the first batch aborted by a network failure.
    ///
    /// # Errors
    ///
    /// - [`UploadError::SessionEnded`] after logout
    /// - credential errors from the exchange
    /// - [`UploadError::Storage`] when the local store fails; the batch being
    ///   processed stays queued
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<UploadReport, UploadError> {
        let _guard = self.cycle_lock.lock().await;
        let start = Instant::now();
        let mut report = UploadReport::default();

        let material = self.current_material()?;

        let pending = self.source.pending_count().await.map_err(UploadError::Storage)?;
        if pending == 0 {
            debug!("No pending transactions");
            self.status.update(|s| s.pending_batches = 0);
            return Ok(report);
        }

        info!(pending, "Starting upload cycle");

        let credentials = match self.backend.exchange_credentials(&material).await {
            Ok(credentials) => credentials,
            Err(err) => {
                let err = UploadError::from(err);
                warn!(error = %err, "Credential exchange failed");
                self.status.update(|s| {
                    s.connected = false;
                    s.last_error = Some(err.to_string());
                    s.pending_batches = pending;
                });
                return Err(err);
            }
        };

        let drained = self.drain(&credentials, &mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        let remaining = self.source.pending_count().await.ok();
        let last_error = match &drained {
            Ok(None) => None,
            Ok(Some(reason)) => Some(reason.clone()),
            Err(err) => Some(err.to_string()),
        };
        let aborted = report.batches_aborted > 0;
        let completed = report.batches_completed > 0;
        let connected = !aborted && drained.is_ok();
        self.status.update(|s| {
            s.connected = connected;
            if completed {
                s.last_synced_at = Some(Utc::now());
            }
            s.last_error = last_error;
            if let Some(remaining) = remaining {
                s.pending_batches = remaining;
            }
        });

        drained?;

        info!(
            batches_completed = report.batches_completed,
            batches_aborted = report.batches_aborted,
            succeeded = report.operations_succeeded,
            rejected = report.operations_rejected,
            skipped = report.operations_skipped,
            mapping_gaps = report.mapping_gaps,
            duration_ms = report.duration_ms,
            "Upload cycle finished"
        );

        Ok(report)
    }

    /// Processes batches until the queue is empty, the per-cycle bound is
    /// reached or a batch is aborted. Returns why it stopped early, if it did.
    async fn drain(
        &self,
        credentials: &Credentials,
        report: &mut UploadReport,
    ) -> Result<Option<String>, UploadError> {
        while report.batches_processed() < self.max_batches_per_cycle {
            let Some(batch) = self.source.next_batch().await.map_err(UploadError::Storage)? else {
                break;
            };

            let summary = self.process_batch(credentials, &batch).await?;
            report.add(&summary);

            if !summary.is_complete() {
                return Ok(Some(format!(
                    "batch {} aborted by a network failure",
                    summary.batch_id
                )));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Batch
    // ========================================================================

    /// Processes one batch from its first operation and applies the
    /// finalizer's decision to the queue
    pub async fn process_batch(
        &self,
        credentials: &Credentials,
        batch: &Transaction,
    ) -> Result<BatchSummary, UploadError> {
        let mut finalizer = TransactionFinalizer::new(batch.id());
        let mut pending = PendingWrites::default();
        debug!(batch_id = %batch.id(), operations = batch.len(), "Processing batch");

        for (index, op) in batch.operations().iter().enumerate() {
            let outcome = match self.process_operation(credentials, op, &mut pending).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(
                        batch_id = %batch.id(),
                        index,
                        entity_type = op.entity_type(),
                        error = %err,
                        "Local failure, batch left queued"
                    );
                    finalizer.abort()?;
                    self.leave_queued(batch.id()).await;
                    return Err(err);
                }
            };

            if finalizer.record(outcome) == Step::Abort {
                warn!(
                    batch_id = %batch.id(),
                    index,
                    entity_type = op.entity_type(),
                    "Network failure, batch left queued"
                );
                break;
            }
        }

        let summary = finalizer.finish()?;
        if summary.is_complete() {
            self.source
                .complete_batch(batch.id())
                .await
                .map_err(UploadError::Storage)?;
            debug!(
                batch_id = %batch.id(),
                succeeded = summary.succeeded,
                rejected = summary.rejected,
                "Batch complete"
            );
            self.commit(pending).await?;
        } else {
            debug!(
                batch_id = %batch.id(),
                discarded = pending.len(),
                "Local writes of aborted batch discarded"
            );
            self.leave_queued(batch.id()).await;
        }

        Ok(summary)
    }

    async fn leave_queued(&self, id: BatchId) {
        if let Err(e) = self.source.record_attempt(id).await {
            warn!(batch_id = %id, error = %e, "Failed to record batch attempt");
        }
    }

    /// Applies the local writes of a completed batch in acceptance order
    async fn commit(&self, pending: PendingWrites) -> Result<(), UploadError> {
        for write in pending.writes {
            match write {
                LocalWrite::Synced {
                    entity_type,
                    local_id,
                    fields,
                } => self
                    .store
                    .mark_synced(&entity_type, &local_id, &fields)
                    .await
                    .map_err(UploadError::Storage)?,
                LocalWrite::Removed {
                    entity_type,
                    local_id,
                } => {
                    let removed = self
                        .store
                        .delete_record(&entity_type, &local_id)
                        .await
                        .map_err(UploadError::Storage)?;
                    debug!(
                        entity_type = %entity_type,
                        local_id = %local_id,
                        removed,
                        "Local record removed"
                    );
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Operation
    // ========================================================================

    async fn process_operation(
        &self,
        credentials: &Credentials,
        op: &PendingOperation,
        pending: &mut PendingWrites,
    ) -> Result<OperationOutcome, UploadError> {
        let record = self
            .store
            .get_record(op.entity_type(), op.local_id())
            .await
            .map_err(UploadError::Storage)?;
        let record = pending.overlay(op.entity_type(), op.local_id(), record);

        let MappedOperation {
            intent,
            mut request,
        } = match self.mapper.classify(op, record.as_ref()) {
            Ok(Classification::Submit(mapped)) => mapped,
            Ok(Classification::Noop) => return Ok(OperationOutcome::Skipped),
            Err(err) => return self.mapping_failed(op, err).await,
        };

        let mapping = match self.mapper.mapping(op.entity_type()) {
            Ok(mapping) => mapping,
            Err(err) => return self.mapping_failed(op, err).await,
        };

        if let Err(err) = self.resolver.resolve(mapping, &mut request).await {
            return self.mapping_failed(op, err).await;
        }

        let outcome = self.backend.submit(credentials, &request).await;
        self.audit
            .log_outcome(op.entity_type(), op.local_id(), &request.operation, &outcome)
            .await;

        match outcome {
            RemoteOperationResult::Success { server_id, .. } => {
                self.apply_success(op, &intent, server_id, pending).await?;
                Ok(OperationOutcome::Succeeded)
            }
            RemoteOperationResult::BusinessRejection { message, .. } => {
                info!(
                    entity_type = op.entity_type(),
                    local_id = %op.local_id(),
                    operation = %request.operation,
                    message = %message,
                    "Operation rejected, dropped"
                );
                Ok(OperationOutcome::Rejected)
            }
            RemoteOperationResult::NetworkFailure { cause, .. } => {
                debug!(
                    entity_type = op.entity_type(),
                    local_id = %op.local_id(),
                    %cause,
                    "Operation got no answer"
                );
                Ok(OperationOutcome::NetworkFailure)
            }
        }
    }

    /// Mapping gaps are audited and dropped; storage failures propagate
    async fn mapping_failed(
        &self,
        op: &PendingOperation,
        err: MappingError,
    ) -> Result<OperationOutcome, UploadError> {
        let reason = match err {
            MappingError::Storage(e) => return Err(UploadError::Storage(e)),
            MappingError::UnknownEntityType(_) => ReasonCode::UnknownEntityType,
            MappingError::NoMatchingAction { .. } => ReasonCode::NoMatchingAction,
            MappingError::MissingField { .. } => ReasonCode::MissingField,
            MappingError::UnsupportedOperation { .. } => ReasonCode::UnsupportedOperation,
        };

        info!(
            entity_type = op.entity_type(),
            local_id = %op.local_id(),
            %reason,
            error = %err,
            "Operation has no remote mapping, dropped"
        );
        self.audit
            .log_mapping_gap(op.entity_type(), op.local_id(), reason, &err.to_string())
            .await;
        Ok(OperationOutcome::MappingGap)
    }

    /// Local writes after the backend accepted an operation. Only the server
    /// id is written now; the rest waits for the batch to complete.
    async fn apply_success(
        &self,
        op: &PendingOperation,
        intent: &Intent,
        server_id: Option<i64>,
        pending: &mut PendingWrites,
    ) -> Result<(), UploadError> {
        let entity_type = op.entity_type();
        let local_id = op.local_id();

        if intent.is_placeholder() {
            pending.remove(entity_type, local_id);
            return Ok(());
        }

        if let (OperationKind::Create, LocalId::Temporary(_), Some(server_id)) =
            (op.kind(), local_id, server_id)
        {
            self.store
                .assign_server_id(entity_type, local_id, server_id)
                .await
                .map_err(UploadError::Storage)?;
        }

        match op.kind() {
            OperationKind::Create | OperationKind::Update => {
                pending.mark_synced(entity_type, local_id, op.data().clone())
            }
            OperationKind::Delete => pending.remove(entity_type, local_id),
        }

        Ok(())
    }
}

// ============================================================================
// PendingWrites
// ============================================================================

#[derive(Debug)]
enum LocalWrite {
    Synced {
        entity_type: String,
        local_id: LocalId,
        fields: FieldMap,
    },
    Removed {
        entity_type: String,
        local_id: LocalId,
    },
}

/// Local writes of the batch in progress
#[derive(Debug, Default)]
struct PendingWrites {
    writes: Vec<LocalWrite>,
    /// Acknowledged fields per record, merged in acceptance order
    acknowledged: HashMap<(String, LocalId), FieldMap>,
}

impl PendingWrites {
    fn len(&self) -> usize {
        self.writes.len()
    }

    fn mark_synced(&mut self, entity_type: &str, local_id: &LocalId, fields: FieldMap) {
        self.acknowledged
            .entry((entity_type.to_string(), *local_id))
            .or_default()
            .extend(fields.iter().map(|(name, value)| (name.clone(), value.clone())));
        self.writes.push(LocalWrite::Synced {
            entity_type: entity_type.to_string(),
            local_id: *local_id,
            fields,
        });
    }

    fn remove(&mut self, entity_type: &str, local_id: &LocalId) {
        self.writes.push(LocalWrite::Removed {
            entity_type: entity_type.to_string(),
            local_id: *local_id,
        });
    }

    /// The record as later operations of this batch must see it: its stored
    /// snapshot plus whatever the backend already accepted in this attempt
    fn overlay(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        record: Option<LocalRecord>,
    ) -> Option<LocalRecord> {
        let Some(acknowledged) = self.acknowledged.get(&(entity_type.to_string(), *local_id))
        else {
            return record;
        };

        record.map(|record| {
            let mut snapshot = record.synced_data().cloned().unwrap_or_default();
            snapshot.extend(
                acknowledged
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            record.with_synced_data(snapshot)
        })
    }
}

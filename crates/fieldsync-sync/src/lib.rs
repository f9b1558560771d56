//! FieldSync Sync - Upload pipeline orchestration
//!
//! Provides:
//! - The upload engine draining queued mutation batches into the backend
//! - The per-batch finalizer deciding between complete and retry
//! - A periodic scheduler with on-demand triggers
//! - The shared sync status indicator
//!
//! ## Modules
//!
//! - [`engine`] - [`UploadEngine`](engine::UploadEngine) and [`UploadReport`](engine::UploadReport)
//! - [`finalizer`] - Batch state machine
//! - [`scheduler`] - Interval and on-demand cycle triggering
//! - [`status`] - [`SyncStatus`](status::SyncStatus)

pub mod engine;
pub mod finalizer;
pub mod scheduler;
pub mod status;

use fieldsync_core::domain::DomainError;
use fieldsync_core::ports::CredentialError;
use thiserror::Error;

pub use engine::{UploadEngine, UploadReport};
pub use finalizer::{BatchSummary, OperationOutcome, TransactionFinalizer};
pub use scheduler::UploadScheduler;
pub use status::{StatusHandle, SyncStatus};

/// Errors that end an upload cycle early
#[derive(Debug, Error)]
pub enum UploadError {
    /// No server address is configured; nothing is attempted
    #[error("Credentials unavailable: no server address configured")]
    CredentialUnavailable,

    /// The backend refused to issue a token
    #[error("Credential exchange rejected: {0}")]
    CredentialRejected(String),

    /// The credential exchange got no answer
    #[error("Network error: {0}")]
    Network(String),

    /// The connector session was logged out
    #[error("Session ended")]
    SessionEnded,

    /// The local store failed; the batch in flight stays queued
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// A domain-level error propagated from fieldsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<CredentialError> for UploadError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Unavailable => UploadError::CredentialUnavailable,
            CredentialError::Rejected(message) => UploadError::CredentialRejected(message),
            CredentialError::Network(message) => UploadError::Network(message),
        }
    }
}

impl UploadError {
    /// Whether a later cycle may succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Network(_) | UploadError::Storage(_))
    }
}

//! Remote backend port (driven/secondary port)
//!
//! Credential exchange and mutation submission against the opaque backend.
//!
//! ## Design Notes
//!
//! - `submit` does not return `Result`: every way a submission can end,
//!   including transport errors, is folded into a [`RemoteOperationResult`]
//!   by the adapter. Callers make the retry decision from that value only.
//! - Credential exchange has its own typed error because the caller reacts
//!   differently to "not configured" and "exchange failed".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Credentials, FieldMap, LocalId, RemoteOperationResult, SessionMaterial};

// ============================================================================
// Request description
// ============================================================================

/// Which unified endpoint a request goes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "endpoint")]
pub enum Endpoint {
    /// `POST /create_unified`
    Create,
    /// `POST /update_unified/<record_id>?entity_type=<model>`
    Update {
        /// Server id when resolved, otherwise the temporary identifier
        record_id: LocalId,
        /// Remote model name
        model: String,
    },
}

impl Endpoint {
    /// URL path relative to the server address
    pub fn path(&self) -> String {
        match self {
            Endpoint::Create => "/create_unified".to_string(),
            Endpoint::Update { record_id, .. } => format!("/update_unified/{record_id}"),
        }
    }

    /// Query parameters to append
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::Create => Vec::new(),
            Endpoint::Update { model, .. } => vec![("entity_type", model.clone())],
        }
    }
}

/// A fully mapped submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub endpoint: Endpoint,
    /// Remote operation name, sent as `params.type`
    pub operation: String,
    /// Payload fields, sent as `params.data`
    pub data: FieldMap,
}

impl RemoteRequest {
    pub fn new(endpoint: Endpoint, operation: impl Into<String>, data: FieldMap) -> Self {
        Self {
            endpoint,
            operation: operation.into(),
            data,
        }
    }
}

// ============================================================================
// Credential errors
// ============================================================================

/// Failure to obtain transport credentials
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No server address is configured; do not attempt sync
    #[error("No server address configured")]
    Unavailable,

    /// The exchange call got no authoritative answer
    #[error("Credential exchange failed: {0}")]
    Network(String),

    /// The backend refused to issue a token
    #[error("Credential exchange rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// IRemoteBackend trait
// ============================================================================

/// Port trait for the remote write API
#[async_trait::async_trait]
pub trait IRemoteBackend: Send + Sync {
    /// Exchanges stored session material for short-lived credentials.
    ///
    /// Fails with [`CredentialError::Unavailable`] when no server address is
    /// configured. Exchange failures are propagated; no token is made up.
    async fn exchange_credentials(
        &self,
        material: &SessionMaterial,
    ) -> Result<Credentials, CredentialError>;

    /// Performs one submission and classifies its outcome
    async fn submit(&self, credentials: &Credentials, request: &RemoteRequest)
        -> RemoteOperationResult;
}

//! Remote operation outcomes
//!
//! Every submission ends in exactly one [`RemoteOperationResult`]. The
//! retry-versus-drop decision is taken from this value alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;

/// Structured reason for a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "cause", content = "status")]
pub enum NetworkCause {
    /// Connection could not be established (refused, DNS, TLS)
    Connect,
    /// The request or response timed out
    Timeout,
    /// The request could not be sent
    Request,
    /// The response body could not be read
    Body,
    /// The server answered with an infrastructure status (401, 408, 429, 5xx)
    ServerStatus(u16),
    /// The backend reported the session as expired
    SessionExpired,
    /// A response arrived but carried no recognizable envelope
    MalformedResponse,
    /// Unstructured failure recognized by message only
    Other,
}

impl NetworkCause {
    /// Stable code stored in audit details
    pub fn code(&self) -> &'static str {
        match self {
            NetworkCause::Connect => "connect",
            NetworkCause::Timeout => "timeout",
            NetworkCause::Request => "request",
            NetworkCause::Body => "body",
            NetworkCause::ServerStatus(_) => "server_status",
            NetworkCause::SessionExpired => "session_expired",
            NetworkCause::MalformedResponse => "malformed_response",
            NetworkCause::Other => "other",
        }
    }
}

impl std::fmt::Display for NetworkCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkCause::ServerStatus(status) => write!(f, "server_status({status})"),
            other => f.write_str(other.code()),
        }
    }
}

/// Classified result of one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RemoteOperationResult {
    /// The backend accepted the operation
    Success {
        /// Identifier the backend assigned or echoed, if any
        server_id: Option<i64>,
        /// The `result` object of the response
        payload: Value,
    },
    /// The backend understood and declined the operation. Never retried.
    BusinessRejection { message: String, details: Value },
    /// No authoritative answer was received. The batch must be retried.
    NetworkFailure { cause: NetworkCause, message: String },
}

impl RemoteOperationResult {
    pub fn success(server_id: Option<i64>, payload: Value) -> Self {
        RemoteOperationResult::Success { server_id, payload }
    }

    pub fn rejection(message: impl Into<String>, details: Value) -> Self {
        RemoteOperationResult::BusinessRejection {
            message: message.into(),
            details,
        }
    }

    pub fn network(cause: NetworkCause, message: impl Into<String>) -> Self {
        RemoteOperationResult::NetworkFailure {
            cause,
            message: message.into(),
        }
    }

    /// The outcome kind for audit and reporting
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RemoteOperationResult::Success { .. } => OutcomeKind::Success,
            RemoteOperationResult::BusinessRejection { .. } => OutcomeKind::BusinessRejection,
            RemoteOperationResult::NetworkFailure { .. } => OutcomeKind::NetworkFailure,
        }
    }

    /// Returns true if retrying the batch could change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteOperationResult::NetworkFailure { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RemoteOperationResult::Success { .. })
    }
}

/// Outcome kinds recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    BusinessRejection,
    /// No mapping exists for the entity type or the change pattern
    MappingGap,
    NetworkFailure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::BusinessRejection => "business_rejection",
            OutcomeKind::MappingGap => "mapping_gap",
            OutcomeKind::NetworkFailure => "network_failure",
        }
    }

    /// Failure kinds are deduplicated in the audit log; successes are not
    pub fn is_failure(&self) -> bool {
        !matches!(self, OutcomeKind::Success)
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(OutcomeKind::Success),
            "business_rejection" => Ok(OutcomeKind::BusinessRejection),
            "mapping_gap" => Ok(OutcomeKind::MappingGap),
            "network_failure" => Ok(OutcomeKind::NetworkFailure),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown outcome kind '{other}'"
            ))),
        }
    }
}

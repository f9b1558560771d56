//! Reason codes for audit log entries
//!
//! Structured codes for categorizing why a submission did not succeed. They
//! are stored in the `reason` key of an entry's details, next to the free
//! text message, so failures can be grouped without parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use fieldsync_core::domain::NetworkCause;

/// Structured reason codes for failed submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The backend understood the operation and refused it
    RemoteRejected,
    /// No mapping is registered for the entity type
    UnknownEntityType,
    /// An update matched no action rule and generic updates are not allowed
    NoMatchingAction,
    /// A field required by the remote operation is missing locally
    MissingField,
    /// The entity type does not support this kind of operation
    UnsupportedOperation,
    /// The connection could not be established
    ConnectFailed,
    /// The request timed out
    Timeout,
    /// The request could not be sent or the response could not be read
    TransportError,
    /// The server answered with an infrastructure error status
    ServerUnavailable,
    /// The backend session expired
    SessionExpired,
    /// The response was not a valid envelope
    MalformedResponse,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::RemoteRejected => "remote_rejected",
            ReasonCode::UnknownEntityType => "unknown_entity_type",
            ReasonCode::NoMatchingAction => "no_matching_action",
            ReasonCode::MissingField => "missing_field",
            ReasonCode::UnsupportedOperation => "unsupported_operation",
            ReasonCode::ConnectFailed => "connect_failed",
            ReasonCode::Timeout => "timeout",
            ReasonCode::TransportError => "transport_error",
            ReasonCode::ServerUnavailable => "server_unavailable",
            ReasonCode::SessionExpired => "session_expired",
            ReasonCode::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&NetworkCause> for ReasonCode {
    fn from(cause: &NetworkCause) -> Self {
        match cause {
            NetworkCause::Connect => ReasonCode::ConnectFailed,
            NetworkCause::Timeout => ReasonCode::Timeout,
            NetworkCause::Request | NetworkCause::Body | NetworkCause::Other => {
                ReasonCode::TransportError
            }
            NetworkCause::ServerStatus(_) => ReasonCode::ServerUnavailable,
            NetworkCause::SessionExpired => ReasonCode::SessionExpired,
            NetworkCause::MalformedResponse => ReasonCode::MalformedResponse,
        }
    }
}

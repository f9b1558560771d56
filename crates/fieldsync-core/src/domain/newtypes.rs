//! Domain newtypes for identifiers
//!
//! This module provides strongly-typed wrappers for the identifiers that flow
//! through the upload pipeline. The central one is [`LocalId`], which models
//! the two shapes a local record identifier can take over its lifetime.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// LocalId
// ============================================================================

/// Identifier of a local record.
///
/// A record created offline carries a client-generated [`Uuid`] until the
/// backend confirms it; records that were synced at least once are addressed
/// by the integer identifier the server assigned.
///
/// Serialized untagged: a server id is a JSON number, a temporary id a
/// JSON string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalId {
    /// Permanent identifier assigned by the backend
    Server(i64),
    /// Client-generated identifier for a record not yet confirmed remotely
    Temporary(Uuid),
}

impl LocalId {
    /// Generates a fresh temporary identifier
    #[must_use]
    pub fn new_temporary() -> Self {
        LocalId::Temporary(Uuid::new_v4())
    }

    /// Returns true if this is a client-generated identifier
    pub fn is_temporary(&self) -> bool {
        matches!(self, LocalId::Temporary(_))
    }

    /// Returns the server identifier, if this is one
    pub fn server_id(&self) -> Option<i64> {
        match self {
            LocalId::Server(id) => Some(*id),
            LocalId::Temporary(_) => None,
        }
    }

    /// Returns the temporary identifier, if this is one
    pub fn temporary(&self) -> Option<&Uuid> {
        match self {
            LocalId::Temporary(uuid) => Some(uuid),
            LocalId::Server(_) => None,
        }
    }

    /// Converts the identifier into the JSON value sent on the wire
    pub fn to_value(&self) -> Value {
        match self {
            LocalId::Server(id) => Value::from(*id),
            LocalId::Temporary(uuid) => Value::String(uuid.to_string()),
        }
    }

    /// Interprets a payload field value as an identifier.
    ///
    /// Accepts integers, numeric strings and UUID strings. Anything else
    /// (null, floats, free text, objects) is not an identifier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(LocalId::Server),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl Display for LocalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LocalId::Server(id) => write!(f, "{id}"),
            LocalId::Temporary(uuid) => write!(f, "{uuid}"),
        }
    }
}

impl FromStr for LocalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(LocalId::Server(id));
        }
        Uuid::parse_str(s)
            .map(LocalId::Temporary)
            .map_err(|_| DomainError::InvalidId(s.to_string()))
    }
}

impl From<i64> for LocalId {
    fn from(id: i64) -> Self {
        LocalId::Server(id)
    }
}

impl From<Uuid> for LocalId {
    fn from(uuid: Uuid) -> Self {
        LocalId::Temporary(uuid)
    }
}

// ============================================================================
// Integer-based ID types (database-assigned)
// ============================================================================

/// Identifier of a queued transaction (assigned by the mutation queue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(i64);

impl BatchId {
    /// Create a BatchId from a raw database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BatchId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier for audit log entries (database auto-increment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(i64);

impl AuditId {
    /// Create an AuditId from a raw database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for AuditId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AuditId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a connector session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

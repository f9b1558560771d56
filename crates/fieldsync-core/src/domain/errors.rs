//! Domain error types
//!
//! Errors raised by domain types themselves: identifier parsing,
//! state machine transitions, and record validation.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Value is neither a server id nor a temporary identifier
    #[error("Invalid local identifier: {0}")]
    InvalidId(String),

    /// Entity type name is empty or malformed
    #[error("Invalid entity type: {0}")]
    InvalidEntityType(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

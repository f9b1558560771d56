//! Error types for the intent mapper

use thiserror::Error;

use fieldsync_core::domain::OperationKind;

/// Errors that can occur while mapping an operation to a remote call
#[derive(Debug, Error)]
pub enum MappingError {
    /// No mapping is registered for the entity type
    #[error("no mapping registered for entity type '{0}'")]
    UnknownEntityType(String),

    /// An update matched no action rule and generic updates are not allowed
    #[error("no action matches changed fields [{}] of '{entity_type}'", changed.join(", "))]
    NoMatchingAction {
        entity_type: String,
        changed: Vec<String>,
    },

    /// An action needs a field that is neither changed nor in the local record
    #[error("action '{operation}' requires field '{field}' which is not available")]
    MissingField { operation: String, field: String },

    /// The entity does not support this kind of operation remotely
    #[error("'{kind}' is not supported for entity type '{entity_type}'")]
    UnsupportedOperation {
        entity_type: String,
        kind: OperationKind,
    },

    /// Local store failure while resolving identifiers
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl MappingError {
    /// Returns true if the error means "this operation can never be mapped",
    /// as opposed to an infrastructure failure.
    pub fn is_mapping_gap(&self) -> bool {
        !matches!(self, MappingError::Storage(_))
    }
}

//! Intent classification
//!
//! Turns a [`PendingOperation`] into the remote call it represents. Creates
//! map directly to the entity's create operation; updates are diffed against
//! the last-synced snapshot and matched against the entity's action rules
//! before falling back to a generic field write; deletes map to unlink.
//!
//! The classifier is pure: it reads the operation and the local record and
//! never writes anything.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use fieldsync_core::domain::{LocalRecord, OperationKind, PendingOperation};
use fieldsync_core::ports::{Endpoint, RemoteRequest};

use crate::diff::FieldDiff;
use crate::error::MappingError;
use crate::payload::{apply_renames, strip_metadata, ActionInput};
use crate::registry::{EntityMapping, MappingRegistry};

/// Payload field carrying the client-generated identifier of a create
pub const CLIENT_UUID_FIELD: &str = "client_uuid";

/// What kind of remote call an operation was mapped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create,
    /// Create of a placeholder record; the record is deleted on success
    PlaceholderAction,
    /// Update redirected to a business action
    Action(String),
    /// Update sent as a plain field write
    GenericUpdate,
    Delete,
}

impl Intent {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Intent::PlaceholderAction)
    }
}

/// A fully mapped operation, before identifier resolution
#[derive(Debug, Clone, PartialEq)]
pub struct MappedOperation {
    pub intent: Intent,
    pub request: RemoteRequest,
}

/// Result of classifying one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Submit this request
    Submit(MappedOperation),
    /// Nothing effectively changed; do not submit
    Noop,
}

/// Maps pending operations to remote requests using a registry
#[derive(Debug, Clone)]
pub struct IntentMapper {
    registry: Arc<MappingRegistry>,
}

impl IntentMapper {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Mapping of an entity type, or [`MappingError::UnknownEntityType`]
    pub fn mapping(&self, entity_type: &str) -> Result<&EntityMapping, MappingError> {
        self.registry
            .get(entity_type)
            .ok_or_else(|| MappingError::UnknownEntityType(entity_type.to_string()))
    }

    /// Classifies one operation.
    ///
    /// `record` is the current local snapshot of the operation's entity, if
    /// it still exists locally.
    pub fn classify(
        &self,
        operation: &PendingOperation,
        record: Option<&LocalRecord>,
    ) -> Result<Classification, MappingError> {
        let mapping = self.mapping(operation.entity_type())?;

        let classification = match operation.kind() {
            OperationKind::Create => Classification::Submit(map_create(mapping, operation)),
            OperationKind::Update => map_update(mapping, operation, record)?,
            OperationKind::Delete => Classification::Submit(map_delete(mapping, operation, record)?),
        };

        match &classification {
            Classification::Submit(mapped) => debug!(
                entity_type = %operation.entity_type(),
                local_id = %operation.local_id(),
                kind = %operation.kind(),
                remote_operation = %mapped.request.operation,
                intent = ?mapped.intent,
                "Operation classified"
            ),
            Classification::Noop => debug!(
                entity_type = %operation.entity_type(),
                local_id = %operation.local_id(),
                "Update has no effective changes"
            ),
        }

        Ok(classification)
    }
}

fn map_create(mapping: &EntityMapping, operation: &PendingOperation) -> MappedOperation {
    let mut data = strip_metadata(operation.data());
    if let Some(uuid) = operation.local_id().temporary() {
        data.insert(CLIENT_UUID_FIELD.to_string(), Value::String(uuid.to_string()));
    }

    let intent = if mapping.is_placeholder() {
        Intent::PlaceholderAction
    } else {
        Intent::Create
    };

    MappedOperation {
        intent,
        request: RemoteRequest::new(
            Endpoint::Create,
            mapping.create_op(),
            apply_renames(data, mapping.field_renames()),
        ),
    }
}

fn map_update(
    mapping: &EntityMapping,
    operation: &PendingOperation,
    record: Option<&LocalRecord>,
) -> Result<Classification, MappingError> {
    let shadow = record.and_then(LocalRecord::synced_data);
    let diff = FieldDiff::compute(operation.data(), shadow);
    if diff.is_empty() {
        return Ok(Classification::Noop);
    }

    let (intent, remote_operation, data) = match mapping.actions().evaluate(&diff) {
        Some(rule) => {
            let input = ActionInput {
                operation: rule.operation(),
                diff: &diff,
                record,
            };
            let payload = rule.build_payload(&input)?;
            (
                Intent::Action(rule.operation().to_string()),
                rule.operation().to_string(),
                payload,
            )
        }
        None if mapping.allows_generic_update() => (
            Intent::GenericUpdate,
            mapping.update_operation(),
            diff.into_fields(),
        ),
        None => {
            return Err(MappingError::NoMatchingAction {
                entity_type: mapping.entity_type().to_string(),
                changed: diff.changed_names(),
            })
        }
    };

    Ok(Classification::Submit(MappedOperation {
        intent,
        request: RemoteRequest::new(
            update_endpoint(mapping, operation, record),
            remote_operation,
            apply_renames(data, mapping.field_renames()),
        ),
    }))
}

fn map_delete(
    mapping: &EntityMapping,
    operation: &PendingOperation,
    record: Option<&LocalRecord>,
) -> Result<MappedOperation, MappingError> {
    if !mapping.is_deletable() {
        return Err(MappingError::UnsupportedOperation {
            entity_type: mapping.entity_type().to_string(),
            kind: OperationKind::Delete,
        });
    }

    Ok(MappedOperation {
        intent: Intent::Delete,
        request: RemoteRequest::new(
            update_endpoint(mapping, operation, record),
            mapping.delete_operation(),
            Default::default(),
        ),
    })
}

fn update_endpoint(
    mapping: &EntityMapping,
    operation: &PendingOperation,
    record: Option<&LocalRecord>,
) -> Endpoint {
    Endpoint::Update {
        record_id: record
            .map(LocalRecord::remote_id)
            .unwrap_or(*operation.local_id()),
        model: mapping.remote_model().to_string(),
    }
}

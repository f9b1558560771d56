//! Queued mutations
//!
//! A [`Transaction`] is one batch yielded by the mutation queue; it holds the
//! [`PendingOperation`]s committed locally, in commit order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::newtypes::{BatchId, LocalId};

/// A flat map of field name to JSON value, as stored for local records
pub type FieldMap = Map<String, Value>;

/// Kind of local change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Stable lowercase name used for persistence and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = super::errors::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            other => Err(super::errors::DomainError::ValidationFailed(format!(
                "unknown operation kind '{other}'"
            ))),
        }
    }
}

/// One queued local change awaiting submission.
///
/// `data` holds the full record snapshot for a create, the changed-field set
/// for an update, and is empty for a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    kind: OperationKind,
    entity_type: String,
    local_id: LocalId,
    data: FieldMap,
}

impl PendingOperation {
    /// Creates an operation of the given kind
    pub fn new(
        kind: OperationKind,
        entity_type: impl Into<String>,
        local_id: LocalId,
        data: FieldMap,
    ) -> Self {
        Self {
            kind,
            entity_type: entity_type.into(),
            local_id,
            data,
        }
    }

    /// A create carrying the full local snapshot
    pub fn create(entity_type: impl Into<String>, local_id: LocalId, snapshot: FieldMap) -> Self {
        Self::new(OperationKind::Create, entity_type, local_id, snapshot)
    }

    /// An update carrying only the changed fields
    pub fn update(entity_type: impl Into<String>, local_id: LocalId, changed: FieldMap) -> Self {
        Self::new(OperationKind::Update, entity_type, local_id, changed)
    }

    /// A delete; carries no data
    pub fn delete(entity_type: impl Into<String>, local_id: LocalId) -> Self {
        Self::new(OperationKind::Delete, entity_type, local_id, FieldMap::new())
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn local_id(&self) -> &LocalId {
        &self.local_id
    }

    /// Snapshot (create) or changed fields (update)
    pub fn data(&self) -> &FieldMap {
        &self.data
    }
}

/// A batch of operations processed together.
///
/// Infrastructure failures abort and requeue the whole batch; operations are
/// always replayed from the first one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: BatchId,
    operations: Vec<PendingOperation>,
}

impl Transaction {
    pub fn new(id: BatchId, operations: Vec<PendingOperation>) -> Self {
        Self { id, operations }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Operations in local commit order
    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

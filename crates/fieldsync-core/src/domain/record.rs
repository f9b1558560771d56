//! Local record snapshot
//!
//! A [`LocalRecord`] is the pipeline's view of one row in the local
//! datastore: its current field values plus the snapshot last acknowledged
//! by the backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::LocalId;
use super::operation::FieldMap;

/// A row of the local datastore as seen by the upload pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    entity_type: String,
    local_id: LocalId,
    server_id: Option<i64>,
    data: FieldMap,
    synced_data: Option<FieldMap>,
}

impl LocalRecord {
    /// A record that was never synced
    pub fn new(entity_type: impl Into<String>, local_id: LocalId, data: FieldMap) -> Self {
        let server_id = local_id.server_id();
        Self {
            entity_type: entity_type.into(),
            local_id,
            server_id,
            data,
            synced_data: None,
        }
    }

    /// Sets the server-assigned identifier
    pub fn with_server_id(mut self, server_id: i64) -> Self {
        self.server_id = Some(server_id);
        self
    }

    /// Sets the last-synced snapshot
    pub fn with_synced_data(mut self, synced: FieldMap) -> Self {
        self.synced_data = Some(synced);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn local_id(&self) -> &LocalId {
        &self.local_id
    }

    /// Identifier assigned by the backend, if the record was confirmed
    pub fn server_id(&self) -> Option<i64> {
        self.server_id
    }

    /// Current field values
    pub fn data(&self) -> &FieldMap {
        &self.data
    }

    /// Field values last acknowledged by the backend
    pub fn synced_data(&self) -> Option<&FieldMap> {
        self.synced_data.as_ref()
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Identifier to address this record remotely: the server id if known,
    /// otherwise the local identifier as-is.
    pub fn remote_id(&self) -> LocalId {
        self.server_id
            .map(LocalId::Server)
            .unwrap_or(self.local_id)
    }
}

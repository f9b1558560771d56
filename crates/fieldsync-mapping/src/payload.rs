//! Payload shaping helpers
//!
//! Metadata stripping, field renames and the field picking used by action
//! payload builders.

use serde_json::Value;

use fieldsync_core::domain::{FieldMap, LocalRecord};

use crate::diff::FieldDiff;
use crate::error::MappingError;

/// Local-only fields never sent to the backend
const METADATA_FIELDS: &[&str] = &[
    "id",
    "entity_type",
    "created_at",
    "updated_at",
    "synced_at",
    "server_id",
];

/// Returns true for fields that are never part of a remote payload.
///
/// Besides the fixed list, any field starting with `_` is an internal flag.
pub fn is_metadata(field: &str) -> bool {
    field.starts_with('_') || METADATA_FIELDS.contains(&field)
}

/// Removes metadata fields
pub fn strip_metadata(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(name, _)| !is_metadata(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Renames keys according to `renames` (local name, remote name).
/// Keys without an entry keep their name.
pub fn apply_renames(fields: FieldMap, renames: &[(String, String)]) -> FieldMap {
    fields
        .into_iter()
        .map(|(name, value)| {
            let renamed = renames
                .iter()
                .find(|(local, _)| *local == name)
                .map(|(_, remote)| remote.clone())
                .unwrap_or(name);
            (renamed, value)
        })
        .collect()
}

/// What an action payload builder sees
#[derive(Debug, Clone, Copy)]
pub struct ActionInput<'a> {
    pub operation: &'a str,
    pub diff: &'a FieldDiff,
    /// Current full local snapshot, when the record exists locally
    pub record: Option<&'a LocalRecord>,
}

impl<'a> ActionInput<'a> {
    /// Value of a field: the changed value if present, otherwise the
    /// current value in the local snapshot.
    pub fn value(&self, field: &str) -> Option<&'a Value> {
        self.diff
            .get(field)
            .or_else(|| self.record.and_then(|record| record.field(field)))
    }

    /// Builds a payload from named fields.
    ///
    /// Every `required` field must be available; `optional` fields are
    /// copied when present and non-null.
    pub fn pick(&self, required: &[&str], optional: &[&str]) -> Result<FieldMap, MappingError> {
        let mut payload = FieldMap::new();
        for field in required {
            let value = self
                .value(field)
                .filter(|value| !value.is_null())
                .ok_or_else(|| MappingError::MissingField {
                    operation: self.operation.to_string(),
                    field: (*field).to_string(),
                })?;
            payload.insert((*field).to_string(), value.clone());
        }
        for field in optional {
            if let Some(value) = self.value(field).filter(|value| !value.is_null()) {
                payload.insert((*field).to_string(), value.clone());
            }
        }
        Ok(payload)
    }
}

//! Field-level change detection
//!
//! A [`FieldDiff`] is the part of an update's changed-field set that
//! actually differs from the snapshot last acknowledged by the backend.

use serde_json::Value;

use fieldsync_core::domain::FieldMap;

use crate::payload::is_metadata;

/// Effective changes of one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDiff {
    fields: FieldMap,
}

impl FieldDiff {
    /// Computes the diff of `changed` against the last-synced `shadow`.
    ///
    /// Metadata fields are dropped. A field whose value equals the shadow's
    /// is not a change. Without a shadow every changed field counts.
    pub fn compute(changed: &FieldMap, shadow: Option<&FieldMap>) -> Self {
        let fields = changed
            .iter()
            .filter(|(name, _)| !is_metadata(name))
            .filter(|(name, value)| match shadow.and_then(|s| s.get(name.as_str())) {
                Some(previous) => previous != *value,
                None => true,
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// True if every changed field is in `allowed`
    pub fn only(&self, allowed: &[&str]) -> bool {
        self.fields.keys().all(|name| allowed.contains(&name.as_str()))
    }

    /// True if at least one of `fields` changed
    pub fn any_of(&self, fields: &[&str]) -> bool {
        fields.iter().any(|field| self.contains(field))
    }

    /// Names of changed fields, sorted
    pub fn changed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }
}

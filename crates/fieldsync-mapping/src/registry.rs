//! Entity mapping registry
//!
//! One [`EntityMapping`] per local entity type describes how its operations
//! translate to remote calls. The [`MappingRegistry`] is the enumerable set
//! of all of them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::rules::{ActionRule, RuleSet};

/// How one local entity type maps to the backend
#[derive(Debug, Clone)]
pub struct EntityMapping {
    entity_type: String,
    remote_model: String,
    create_operation: String,
    field_renames: Vec<(String, String)>,
    foreign_keys: Vec<(String, String)>,
    actions: RuleSet,
    generic_update: bool,
    deletable: bool,
    placeholder: bool,
}

impl EntityMapping {
    /// A mapping with `<model>.create` as create operation and nothing else
    pub fn new(entity_type: impl Into<String>, remote_model: impl Into<String>) -> Self {
        let remote_model = remote_model.into();
        Self {
            entity_type: entity_type.into(),
            create_operation: format!("{remote_model}.create"),
            remote_model,
            field_renames: Vec::new(),
            foreign_keys: Vec::new(),
            actions: RuleSet::new(),
            generic_update: false,
            deletable: false,
            placeholder: false,
        }
    }

    // --- builder ---

    pub fn create_operation(mut self, operation: impl Into<String>) -> Self {
        self.create_operation = operation.into();
        self
    }

    /// Local field `local` is sent as `remote`
    pub fn rename(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.field_renames.push((local.into(), remote.into()));
        self
    }

    /// Local field `field` references a record of `target` entity type
    pub fn foreign_key(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.push((field.into(), target.into()));
        self
    }

    /// Adds an action rule with lower priority than those already added
    pub fn action(mut self, rule: ActionRule) -> Self {
        self.actions.push(rule);
        self
    }

    /// Allows `<model>.write` when no action matches
    pub fn generic_update(mut self) -> Self {
        self.generic_update = true;
        self
    }

    /// Allows deletes via `<model>.unlink`
    pub fn deletable(mut self) -> Self {
        self.deletable = true;
        self
    }

    /// Marks records of this type as placeholders: created only to trigger
    /// a remote action and deleted locally once it succeeds
    pub fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    // --- accessors ---

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn remote_model(&self) -> &str {
        &self.remote_model
    }

    pub fn create_op(&self) -> &str {
        &self.create_operation
    }

    pub fn update_operation(&self) -> String {
        format!("{}.write", self.remote_model)
    }

    pub fn delete_operation(&self) -> String {
        format!("{}.unlink", self.remote_model)
    }

    pub fn field_renames(&self) -> &[(String, String)] {
        &self.field_renames
    }

    /// `(local field, target entity type)` pairs
    pub fn foreign_keys(&self) -> &[(String, String)] {
        &self.foreign_keys
    }

    pub fn actions(&self) -> &RuleSet {
        &self.actions
    }

    pub fn allows_generic_update(&self) -> bool {
        self.generic_update
    }

    pub fn is_deletable(&self) -> bool {
        self.deletable
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Name a local field has in the remote payload
    pub fn remote_field<'a>(&'a self, local: &'a str) -> &'a str {
        self.field_renames
            .iter()
            .find(|(from, _)| from == local)
            .map(|(_, to)| to.as_str())
            .unwrap_or(local)
    }
}

/// All known entity mappings, keyed by local entity type
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: BTreeMap<String, EntityMapping>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping, replacing any previous one for the same type
    pub fn register(&mut self, mapping: EntityMapping) {
        debug!(
            entity_type = %mapping.entity_type(),
            remote_model = %mapping.remote_model(),
            actions = mapping.actions().len(),
            "Registered entity mapping"
        );
        self.mappings.insert(mapping.entity_type.clone(), mapping);
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntityMapping> {
        self.mappings.get(entity_type)
    }

    /// Registered entity types, sorted
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityMapping> {
        self.mappings.values()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl FromIterator<EntityMapping> for MappingRegistry {
    fn from_iter<I: IntoIterator<Item = EntityMapping>>(iter: I) -> Self {
        let mut registry = Self::new();
        for mapping in iter {
            registry.register(mapping);
        }
        registry
    }
}

//! Ordered action rules
//!
//! Each entity type may declare business actions that an update can be
//! redirected to. Rules are evaluated in declaration order and the first
//! match wins; at most one action is inferred per operation.

use std::fmt;

use tracing::trace;

use fieldsync_core::domain::FieldMap;

use crate::diff::FieldDiff;
use crate::error::MappingError;
use crate::payload::ActionInput;

/// Decides whether a diff is an instance of the action
pub type Predicate = fn(&FieldDiff) -> bool;

/// Builds the action payload, using local field names
pub type PayloadBuilder = fn(&ActionInput<'_>) -> Result<FieldMap, MappingError>;

/// A single (predicate, action, payload builder) rule
#[derive(Clone)]
pub struct ActionRule {
    operation: String,
    predicate: Predicate,
    build: PayloadBuilder,
}

impl ActionRule {
    pub fn new(operation: impl Into<String>, predicate: Predicate, build: PayloadBuilder) -> Self {
        Self {
            operation: operation.into(),
            predicate,
            build,
        }
    }

    /// Remote operation name the update is redirected to
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn matches(&self, diff: &FieldDiff) -> bool {
        (self.predicate)(diff)
    }

    pub fn build_payload(&self, input: &ActionInput<'_>) -> Result<FieldMap, MappingError> {
        (self.build)(input)
    }
}

impl fmt::Debug for ActionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRule")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Action rules of one entity type, in priority order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ActionRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule with the lowest priority so far
    pub fn push(&mut self, rule: ActionRule) {
        self.rules.push(rule);
    }

    /// Returns the first rule whose predicate matches the diff
    pub fn evaluate(&self, diff: &FieldDiff) -> Option<&ActionRule> {
        let matched = self.rules.iter().find(|rule| rule.matches(diff));
        match matched {
            Some(rule) => trace!(
                operation = %rule.operation(),
                changed = ?diff.changed_names(),
                "Action rule matched"
            ),
            None => trace!(changed = ?diff.changed_names(), "No action rule matched"),
        }
        matched
    }

    /// Operation names in priority order
    pub fn operations(&self) -> Vec<&str> {
        self.rules.iter().map(ActionRule::operation).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

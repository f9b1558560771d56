//! FieldSync Mapping - Intent classification and identifier resolution
//!
//! Provides:
//! - A registry of per-entity mappings (remote model, renames, foreign keys)
//! - Ordered action rules inferring business actions from changed fields
//! - Payload building with metadata stripping
//! - Resolution of temporary identifiers to server identifiers

pub mod classifier;
pub mod diff;
pub mod entities;
pub mod error;
pub mod payload;
pub mod registry;
pub mod resolver;
pub mod rules;

pub use classifier::{Classification, Intent, IntentMapper, MappedOperation, CLIENT_UUID_FIELD};
pub use diff::FieldDiff;
pub use entities::warehouse_registry;
pub use error::MappingError;
pub use registry::{EntityMapping, MappingRegistry};
pub use resolver::{IdentifierResolver, ResolutionReport};
pub use rules::{ActionRule, RuleSet};

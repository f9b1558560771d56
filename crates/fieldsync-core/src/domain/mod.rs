//! Domain entities and business logic
//!
//! This module contains the core domain types for FieldSync:
//! - Identifiers, including the server/temporary [`LocalId`]
//! - Queued operations and transactions
//! - Local record snapshots
//! - Remote operation outcomes
//! - Audit entries
//! - The connector session
//! - The batch state machine

pub mod audit;
pub mod batch;
pub mod errors;
pub mod newtypes;
pub mod operation;
pub mod outcome;
pub mod record;
pub mod session;

// Re-export commonly used types
pub use audit::AuditEntry;
pub use batch::BatchState;
pub use errors::DomainError;
pub use newtypes::*;
pub use operation::{FieldMap, OperationKind, PendingOperation, Transaction};
pub use outcome::{NetworkCause, OutcomeKind, RemoteOperationResult};
pub use record::LocalRecord;
pub use session::{ConnectorSession, Credentials, SessionMaterial, SessionState};

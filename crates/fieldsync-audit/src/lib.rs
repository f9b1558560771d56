//! FieldSync Audit - Local audit trail of submission outcomes
//!
//! Provides:
//! - `AuditLogger`: High-level service that records one entry per outcome,
//!   deduplicating repeated failures of the same entity
//! - `ReasonCode`: Structured reason codes for failures
//! - Integration with `IAuditRepository` for persistent audit storage

pub mod logger;
pub mod reason;

pub use logger::AuditLogger;
pub use reason::ReasonCode;

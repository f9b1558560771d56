//! FieldSync Core - Domain model for the offline mutation upload pipeline
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `PendingOperation`, `Transaction`, `LocalRecord`, `AuditEntry`,
//!   `ConnectorSession`
//! - **Outcomes** - `RemoteOperationResult`, the single classification every submission
//!   resolves to
//! - **Port definitions** - Traits for adapters: `IMutationSource`, `ILocalStore`,
//!   `IAuditRepository`, `IRemoteBackend`
//! - **Configuration** - YAML-backed `Config`
//!
//! # Architecture
//!
//! The domain module contains pure types with no I/O. Ports define the trait
//! interfaces that adapter crates implement (SQLite, HTTP). The upload engine
//! in `fieldsync-sync` orchestrates domain types through these ports.

pub mod config;
pub mod domain;
pub mod ports;

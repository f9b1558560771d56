//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMutationSource`] - Queue of pending local transactions
//! - [`ILocalStore`] - Local record access and post-success writes
//! - [`IAuditRepository`] - Persistent audit log with failure deduplication
//! - [`IRemoteBackend`] - Credential exchange and mutation submission

pub mod audit_repository;
pub mod local_store;
pub mod mutation_source;
pub mod remote_backend;

pub use audit_repository::IAuditRepository;
pub use local_store::ILocalStore;
pub use mutation_source::IMutationSource;
pub use remote_backend::{CredentialError, Endpoint, IRemoteBackend, RemoteRequest};

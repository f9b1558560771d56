//! FieldSync Remote - HTTP adapter for the backend write API
//!
//! Provides:
//! - Credential exchange against the token endpoint
//! - Submission to the unified create/update endpoints
//! - Classification of every response into success, business rejection or
//!   network failure
//! - Session material storage in the system keyring
//!
//! ## Modules
//!
//! - [`auth`] - Token exchange and keyring-backed session storage
//! - [`backend`] - [`HttpBackend`](backend::HttpBackend), the `IRemoteBackend` implementation
//! - [`classify`] - Outcome classification rules
//! - [`client`] - Thin HTTP client over `reqwest`
//! - [`envelope`] - JSON-RPC request/response shapes

pub mod auth;
pub mod backend;
pub mod classify;
pub mod client;
pub mod envelope;

use thiserror::Error;

pub use backend::HttpBackend;
pub use client::BackendClient;

/// Errors of the HTTP adapter outside of submission outcomes
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The HTTP client could not be built or a request could not be sent
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server address is not a valid URL
    #[error("Invalid server address: {0}")]
    InvalidUrl(String),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The system keyring refused an operation
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Stored session material could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

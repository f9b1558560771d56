//! Backend HTTP client
//!
//! Thin wrapper over `reqwest::Client` that knows the two calls the upload
//! pipeline makes: the token exchange and the JSON-RPC submission. It does
//! not interpret responses; see [`crate::classify`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use fieldsync_remote::client::BackendClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BackendClient::new(Duration::from_secs(60), "X-Session-Id")?;
//! let response = client.post_token("https://erp.example.com", "device-token").await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use url::Url;

use fieldsync_core::config::ServerConfig;

use crate::envelope::{EmptyParams, RpcRequest};
use crate::RemoteError;

/// Path of the token exchange endpoint
const TOKEN_PATH: &str = "/token";

/// HTTP client for the backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    /// Header carrying the stable session identifier on token exchange
    session_header: String,
}

impl BackendClient {
    /// Creates a client whose requests time out after `timeout`
    pub fn new(timeout: Duration, session_header: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, session_header))
    }

    /// Creates a client from the `server` configuration section
    pub fn from_config(config: &ServerConfig) -> Result<Self, RemoteError> {
        Self::new(
            Duration::from_secs(config.request_timeout_secs),
            config.session_header.clone(),
        )
    }

    /// Wraps an existing `reqwest::Client` (useful for testing)
    pub fn with_client(client: Client, session_header: impl Into<String>) -> Self {
        Self {
            client,
            session_header: session_header.into(),
        }
    }

    pub fn session_header(&self) -> &str {
        &self.session_header
    }

    /// `POST <server>/token` with the session identifier header
    pub async fn post_token(
        &self,
        server_url: &str,
        session_token: &str,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{server_url}{TOKEN_PATH}");
        debug!(url = %url, "Exchanging session token");
        self.client
            .post(&url)
            .header(self.session_header.as_str(), session_token)
            .json(&RpcRequest::call(EmptyParams::default()))
            .send()
            .await
    }

    /// `POST <endpoint><path>?<query>` with a JSON-RPC body and bearer token
    pub async fn post_rpc<P: Serialize>(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, String)],
        token: &str,
        params: P,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{endpoint}{path}");
        debug!(url = %url, "Submitting");
        self.client
            .post(&url)
            .query(query)
            .bearer_auth(token)
            .json(&RpcRequest::call(params))
            .send()
            .await
    }
}

/// Validates a server address and strips trailing slashes, so paths can be
/// appended directly
pub fn normalize_server_url(raw: &str) -> Result<String, RemoteError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| RemoteError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RemoteError::InvalidUrl(format!(
            "{raw}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

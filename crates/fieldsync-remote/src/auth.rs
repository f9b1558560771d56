//! Credential exchange and session material storage
//!
//! ## Components
//!
//! - [`exchange_token`] - Trades the stable session token for a short-lived
//!   signed token, once per connection attempt
//! - [`KeyringSessionStorage`] - Secure storage of [`SessionMaterial`] in the
//!   system keyring

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use fieldsync_core::domain::{Credentials, SessionMaterial};
use fieldsync_core::ports::CredentialError;

use crate::classify::is_transient_error;
use crate::client::{normalize_server_url, BackendClient};
use crate::envelope::{RpcResponse, TokenResult};

/// Keyring service name for storing session material
const KEYRING_SERVICE: &str = "fieldsync";

// ============================================================================
// Token exchange
// ============================================================================

/// Exchanges stored session material for transport credentials.
///
/// Fails with [`CredentialError::Unavailable`] when no usable server address
/// is configured. A failed exchange is returned as is; no local token is
/// generated in its place.
pub async fn exchange_token(
    client: &BackendClient,
    material: &SessionMaterial,
) -> Result<Credentials, CredentialError> {
    let raw_url = material.server_url().ok_or(CredentialError::Unavailable)?;
    let server_url = normalize_server_url(raw_url).map_err(|e| {
        warn!(error = %e, "Configured server address is unusable");
        CredentialError::Unavailable
    })?;

    let response = client
        .post_token(&server_url, &material.session_token)
        .await
        .map_err(|e| CredentialError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| CredentialError::Network(e.to_string()))?;

    let token = parse_token_response(status, &body)?;
    info!(server = %server_url, "Obtained transport credentials");
    Ok(Credentials::new(server_url, token))
}

fn parse_token_response(status: StatusCode, body: &[u8]) -> Result<String, CredentialError> {
    if status.is_server_error()
        || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS)
    {
        return Err(CredentialError::Network(format!("token endpoint returned HTTP {status}")));
    }
    if !status.is_success() {
        return Err(CredentialError::Rejected(format!("token endpoint returned HTTP {status}")));
    }

    let envelope: RpcResponse = serde_json::from_slice(body)
        .map_err(|e| CredentialError::Network(format!("malformed token response: {e}")))?;

    if let Some(error) = envelope.error {
        let message = error.best_message();
        return Err(if is_transient_error(&error) {
            CredentialError::Network(message)
        } else {
            CredentialError::Rejected(message)
        });
    }

    let result: TokenResult = envelope
        .result
        .map(serde_json::from_value::<TokenResult>)
        .transpose()
        .map_err(|e| CredentialError::Network(format!("malformed token result: {e}")))?
        .ok_or_else(|| CredentialError::Network("token response has no result".to_string()))?;

    match result.token {
        Some(token) if result.success && !token.is_empty() => {
            debug!("Token exchange succeeded");
            Ok(token)
        }
        _ => Err(CredentialError::Rejected(
            result
                .message
                .unwrap_or_else(|| "token exchange refused".to_string()),
        )),
    }
}

// ============================================================================
// KeyringSessionStorage
// ============================================================================

/// Stores and retrieves session material from the system keyring
///
/// Uses the `keyring` crate to store the material in the OS credential store
/// (e.g., GNOME Keyring, KDE Wallet). Material is serialized as JSON with
/// the service name "fieldsync" and the device profile as the username.
pub struct KeyringSessionStorage;

impl KeyringSessionStorage {
    /// Stores session material for the given profile
    pub fn store(profile: &str, material: &SessionMaterial) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, profile)
            .context("Failed to create keyring entry")?;

        let json = serde_json::to_string(material).context("Failed to serialize session material")?;

        entry
            .set_password(&json)
            .context("Failed to store session material in keyring")?;

        debug!(profile, "Stored session material in keyring");
        Ok(())
    }

    /// Loads session material for the given profile
    ///
    /// # Returns
    /// `Some(SessionMaterial)` if found and valid, `None` if not found
    pub fn load(profile: &str) -> Result<Option<SessionMaterial>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, profile)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(json) => {
                let material: SessionMaterial = serde_json::from_str(&json)
                    .context("Failed to deserialize session material from keyring")?;
                debug!(profile, "Loaded session material from keyring");
                Ok(Some(material))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(profile, "No session material found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes session material for the given profile (logout)
    pub fn clear(profile: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, profile)
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(profile, "Cleared session material from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(profile, "No session material to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

//! Connector session domain entity
//!
//! A [`ConnectorSession`] holds the identity material the upload pipeline
//! uses to talk to the backend. It is created on login and torn down on
//! logout; the pipeline receives it explicitly at construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::SessionId;

/// Long-lived identity material stored on the device
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMaterial {
    /// Backend address; `None` until the device is paired
    pub server_url: Option<String>,
    /// Stable device/session token exchanged for short-lived credentials
    pub session_token: String,
}

impl SessionMaterial {
    pub fn new(server_url: Option<String>, session_token: impl Into<String>) -> Self {
        Self {
            server_url,
            session_token: session_token.into(),
        }
    }

    /// Returns the server address if one is configured and non-blank
    pub fn server_url(&self) -> Option<&str> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl std::fmt::Debug for SessionMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMaterial")
            .field("server_url", &self.server_url)
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Short-lived credentials for the sync transport. Kept in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base address submissions are sent to
    pub endpoint: String,
    /// Signed token obtained from the exchange
    pub token: String,
}

impl Credentials {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Lifecycle state of a connector session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    LoggedOut,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::LoggedOut => write!(f, "logged_out"),
        }
    }
}

/// The active connection identity of the device
#[derive(Debug, Clone)]
pub struct ConnectorSession {
    id: SessionId,
    material: Option<SessionMaterial>,
    state: SessionState,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl ConnectorSession {
    /// Starts a session from stored identity material
    pub fn login(material: SessionMaterial) -> Self {
        Self {
            id: SessionId::new(),
            material: Some(material),
            state: SessionState::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Ends the session and drops the identity material
    pub fn logout(&mut self) -> Result<(), DomainError> {
        if self.state == SessionState::LoggedOut {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: SessionState::LoggedOut.to_string(),
            });
        }
        self.material = None;
        self.state = SessionState::LoggedOut;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Identity material, present only while the session is active
    pub fn material(&self) -> Option<&SessionMaterial> {
        self.material.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}

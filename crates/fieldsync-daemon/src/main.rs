//! FieldSync Daemon - Background upload service
//!
//! This binary runs as a user service and handles:
//! - Draining locally queued mutations into the backend
//! - Periodic checks for pending work
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the local database, loads the device's session material
//! from the system keyring and hands both to an [`UploadScheduler`]. The
//! scheduler loop is controlled by a `CancellationToken` that is triggered
//! on receipt of SIGTERM or SIGINT.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use fieldsync_cache::{DatabasePool, SqliteStore};
use fieldsync_core::config::{Config, LoggingConfig};
use fieldsync_core::domain::{ConnectorSession, SessionMaterial};
use fieldsync_mapping::warehouse_registry;
use fieldsync_remote::{auth::KeyringSessionStorage, BackendClient, HttpBackend};
use fieldsync_sync::{UploadEngine, UploadScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Keyring profile holding the device's session material
const SESSION_PROFILE: &str = "default";

/// How often to look for session material while the device is not paired
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// DaemonService
// ============================================================================

/// Holds the configuration, the local database and the shutdown token
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    store: Arc<SqliteStore>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the configured database
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::from_config(&config.database)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteStore::new(db_pool.pool().clone()));

        Ok(Self {
            config,
            db_pool,
            store,
            shutdown,
        })
    }

    /// Runs the daemon until shutdown
    ///
    /// 1. Waits for session material in the keyring
    /// 2. Wires the HTTP backend, the mapping registry and the store into
    ///    an upload engine
    /// 3. Runs the scheduler loop
    async fn run(&self) -> Result<()> {
        let Some(material) = self.wait_for_session().await? else {
            return Ok(());
        };

        let client = BackendClient::from_config(&self.config.server)
            .context("Failed to build HTTP client")?;
        let session = ConnectorSession::login(material);
        info!(session_id = %session.id(), "Connector session started");

        let engine = UploadEngine::new(
            session,
            Arc::new(warehouse_registry()),
            Arc::new(HttpBackend::new(client)),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        )
        .with_upload_config(&self.config.upload);

        let scheduler = UploadScheduler::from_config(Arc::new(engine), &self.config.upload);
        scheduler.run(self.shutdown.clone()).await;

        let status = scheduler.engine().status().snapshot();
        info!(
            status = %serde_json::to_string(&status).unwrap_or_default(),
            "Final sync status"
        );

        self.db_pool.close().await;
        Ok(())
    }

    /// Returns the session material, polling the keyring until the device
    /// is paired. `None` when shutdown arrives first.
    async fn wait_for_session(&self) -> Result<Option<SessionMaterial>> {
        loop {
            match KeyringSessionStorage::load(SESSION_PROFILE) {
                Ok(Some(material)) => return Ok(Some(self.with_configured_url(material))),
                Ok(None) => {
                    warn!(
                        profile = SESSION_PROFILE,
                        "No session material in keyring, waiting for pairing"
                    );
                }
                Err(e) => {
                    warn!(profile = SESSION_PROFILE, error = %e, "Failed to read keyring");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(SESSION_CHECK_INTERVAL) => {}
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received while waiting for session");
                    return Ok(None);
                }
            }
        }
    }

    /// The configured server address wins over the one stored at pairing
    fn with_configured_url(&self, material: SessionMaterial) -> SessionMaterial {
        match &self.config.server.url {
            Some(url) => SessionMaterial::new(Some(url.clone()), material.session_token),
            None => material,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "FieldSync daemon starting (fieldsyncd)");

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!(%problem, "Invalid configuration");
        }
        anyhow::bail!("Configuration has {} error(s)", problems.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("FieldSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "FieldSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

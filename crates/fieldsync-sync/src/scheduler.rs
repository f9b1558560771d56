//! Upload scheduler - runs upload cycles on an interval and on demand
//!
//! The [`UploadScheduler`] owns the timing of the [`UploadEngine`]. It runs
//! a cycle every poll interval, and immediately when
//! [`request_sync`](UploadScheduler::request_sync) is called. Cycles never
//! overlap: a request arriving while a cycle runs is served right after it.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ UploadScheduler ──→ UploadEngine::run_cycle
//! request_sync ───┘          │
//!                    CancellationToken (shutdown)
//! ```

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fieldsync_core::config::UploadConfig;

use crate::engine::UploadEngine;
use crate::UploadError;

/// Drives an [`UploadEngine`] until cancelled
pub struct UploadScheduler {
    engine: Arc<UploadEngine>,
    /// Set by `request_sync`, cleared when a cycle starts
    sync_requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
    poll_interval: Duration,
}

impl UploadScheduler {
    pub fn new(engine: Arc<UploadEngine>, poll_interval: Duration) -> Self {
        info!(
            poll_ms = poll_interval.as_millis() as u64,
            "Creating upload scheduler"
        );

        Self {
            engine,
            sync_requested: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            poll_interval,
        }
    }

    /// Creates a scheduler using the `upload` configuration section
    pub fn from_config(engine: Arc<UploadEngine>, config: &UploadConfig) -> Self {
        Self::new(engine, Duration::from_secs(config.poll_interval_secs.max(1)))
    }

    pub fn engine(&self) -> &Arc<UploadEngine> {
        &self.engine
    }

    /// Requests a cycle now instead of at the next tick
    pub fn request_sync(&self) {
        info!("Upload requested");
        self.sync_requested.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Returns whether a requested cycle has not started yet
    pub fn is_sync_requested(&self) -> bool {
        self.sync_requested.load(Ordering::Acquire)
    }

    /// Main loop
    ///
    /// Runs until `cancel` fires or the session ends. A cycle in progress
    /// when cancellation arrives is allowed to finish; a batch is never cut
    /// in half by shutdown.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Upload scheduler starting");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Cancellation received, scheduler shutting down");
                    break;
                }

                _ = self.wake.notified() => {
                    debug!("Woken by upload request");
                }

                _ = ticker.tick() => {
                    debug!("Poll interval elapsed");
                }
            }

            if !self.run_once().await {
                break;
            }
        }

        info!("Upload scheduler stopped");
    }

    /// Runs one cycle. Returns false when the scheduler should stop.
    async fn run_once(&self) -> bool {
        self.sync_requested.store(false, Ordering::Release);

        match self.engine.run_cycle().await {
            Ok(report) => {
                if report.batches_processed() > 0 {
                    debug!(
                        batches_completed = report.batches_completed,
                        batches_aborted = report.batches_aborted,
                        "Scheduled cycle done"
                    );
                }
                true
            }
            Err(UploadError::SessionEnded) => {
                info!("Session ended, scheduler stopping");
                false
            }
            Err(UploadError::CredentialUnavailable) => {
                debug!("No server address configured, nothing attempted");
                true
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Upload cycle failed");
                true
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================

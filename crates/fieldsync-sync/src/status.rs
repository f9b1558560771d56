//! Background sync status indicator
//!
//! The only user-visible trace of the uploader: whether the backend was
//! reachable, when the queue was last drained successfully, and how much is
//! still waiting. Individual dropped operations are not reported here; they
//! are in the audit log.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of the uploader's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Whether the last attempt reached the backend
    pub connected: bool,
    /// End of the last cycle that completed at least one batch
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Why the last cycle stopped early, if it did
    pub last_error: Option<String>,
    /// Transactions still queued after the last cycle
    pub pending_batches: u64,
}

/// Shared, cheaply clonable handle to the current [`SyncStatus`]
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<SyncStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status
    pub fn snapshot(&self) -> SyncStatus {
        match self.inner.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

//! Mutation batch source port (driven/secondary port)
//!
//! The local datastore's queue of committed changes. It yields one
//! transaction at a time; a transaction stays at the head of the queue
//! until it is completed.

use crate::domain::{BatchId, Transaction};

/// Port trait for the queue of pending local mutations
///
/// ## Implementation Notes
///
/// - `next_batch` must return the oldest transaction that has not been
///   completed, with operations in local commit order. Calling it again
///   without completing the batch returns the same transaction.
/// - `complete_batch` removes the transaction permanently.
#[async_trait::async_trait]
pub trait IMutationSource: Send + Sync {
    /// Returns the oldest pending transaction, if any
    async fn next_batch(&self) -> anyhow::Result<Option<Transaction>>;

    /// Removes a transaction from the queue; it will never be yielded again
    async fn complete_batch(&self, id: BatchId) -> anyhow::Result<()>;

    /// Records an attempt that ended with the batch left in the queue
    async fn record_attempt(&self, id: BatchId) -> anyhow::Result<()>;

    /// Number of transactions still queued
    async fn pending_count(&self) -> anyhow::Result<u64>;
}

//! Transaction finalizer
//!
//! Tracks one processing attempt of a batch and decides its fate. The first
//! network failure aborts the batch on the spot; every other outcome lets
//! processing continue, and a batch that reaches the end without a network
//! failure is complete, however many of its operations were dropped.

use fieldsync_core::domain::{BatchId, BatchState, DomainError};

/// How a single operation ended, as far as the batch is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Accepted by the backend
    Succeeded,
    /// Refused by the backend; dropped
    Rejected,
    /// Could not be mapped to a remote call; dropped
    MappingGap,
    /// Nothing effectively changed; not submitted
    Skipped,
    /// No authoritative answer; the batch must be retried
    NetworkFailure,
}

/// Whether processing of the batch goes on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Abort,
}

/// Per-batch tallies once the batch reached a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub state: BatchState,
    pub succeeded: u32,
    pub rejected: u32,
    pub mapping_gaps: u32,
    pub skipped: u32,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.state == BatchState::Complete
    }
}

/// State machine for one processing attempt of one batch
#[derive(Debug)]
pub struct TransactionFinalizer {
    batch_id: BatchId,
    state: BatchState,
    succeeded: u32,
    rejected: u32,
    mapping_gaps: u32,
    skipped: u32,
}

impl TransactionFinalizer {
    pub fn new(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            state: BatchState::Processing,
            succeeded: 0,
            rejected: 0,
            mapping_gaps: 0,
            skipped: 0,
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Records the outcome of the next operation.
    ///
    /// Once the batch is aborted every further call answers [`Step::Abort`]
    /// and records nothing.
    pub fn record(&mut self, outcome: OperationOutcome) -> Step {
        if self.state.is_terminal() {
            return Step::Abort;
        }

        match outcome {
            OperationOutcome::Succeeded => self.succeeded += 1,
            OperationOutcome::Rejected => self.rejected += 1,
            OperationOutcome::MappingGap => self.mapping_gaps += 1,
            OperationOutcome::Skipped => self.skipped += 1,
            OperationOutcome::NetworkFailure => {
                self.state = BatchState::Aborted;
                return Step::Abort;
            }
        }
        Step::Continue
    }

    /// Aborts the batch for a reason outside the operation outcomes, such as
    /// a local store failure
    pub fn abort(&mut self) -> Result<(), DomainError> {
        self.state.transition_to(BatchState::Aborted)
    }

    /// Ends the attempt. A batch still processing becomes complete.
    pub fn finish(mut self) -> Result<BatchSummary, DomainError> {
        if self.state == BatchState::Processing {
            self.state.transition_to(BatchState::Complete)?;
        }

        Ok(BatchSummary {
            batch_id: self.batch_id,
            state: self.state,
            succeeded: self.succeeded,
            rejected: self.rejected,
            mapping_gaps: self.mapping_gaps,
            skipped: self.skipped,
        })
    }
}

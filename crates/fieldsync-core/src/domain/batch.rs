//! Batch lifecycle
//!
//! ```text
//! PROCESSING ──► COMPLETE   (every operation attempted, no network failure)
//!      │
//!      └───────► ABORTED    (first network failure; batch stays queued)
//! ```
//!
//! Both terminal states are final for one processing attempt. An aborted
//! batch is picked up again from its first operation on the next cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// State of a batch during one processing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Processing,
    /// Removed from the queue; never retried
    Complete,
    /// Left in the queue; retried from the start
    Aborted,
}

impl BatchState {
    pub fn name(&self) -> &'static str {
        match self {
            BatchState::Processing => "processing",
            BatchState::Complete => "complete",
            BatchState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchState::Processing)
    }

    /// Only `Processing` may move, and only to a terminal state
    pub fn can_transition_to(&self, target: BatchState) -> bool {
        matches!(
            (self, target),
            (BatchState::Processing, BatchState::Complete)
                | (BatchState::Processing, BatchState::Aborted)
        )
    }

    /// Performs a checked transition
    pub fn transition_to(&mut self, target: BatchState) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::common::{ElectionId, Transition};

/// A persisted deadline: `transition` must be applied to `election_id` at `due_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransition {
    pub election_id: ElectionId,
    pub transition: Transition,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub due_at: DateTime<Utc>,
}

/// What `arm` decided for one of an election's deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ArmDecision {
    /// A timer is live and the deadline is persisted.
    Scheduled {
        #[serde(with = "chrono::serde::ts_seconds")]
        at: DateTime<Utc>,
    },
    /// The deadline had already passed; a manual transition is required.
    DeadlinePassed,
}

/// Acknowledgment that automation was armed for an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmReceipt {
    pub election_id: ElectionId,
    pub open: ArmDecision,
    pub close: ArmDecision,
}

/// How a fired transition ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// Another caller got there first.
    AlreadyTransitioned,
    /// A non-retryable rejection, e.g. the election no longer exists.
    Rejected(String),
    /// The ledger kept failing; retries were exhausted.
    Failed(String),
}

impl TransitionOutcome {
    /// Classify the result of a gated transition call.
    pub fn from_result(result: &Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(Error::InvalidState(_)) => Self::AlreadyTransitioned,
            Err(e) if e.is_transient() => Self::Failed(e.to_string()),
            Err(e) => Self::Rejected(e.to_string()),
        }
    }
}

/// Published on the scheduler's event stream whenever a scheduled transition fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub election_id: ElectionId,
    pub transition: Transition,
    pub outcome: TransitionOutcome,
}

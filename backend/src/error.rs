// backend/src/error.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SettingsError;
use crate::store::StoreError;
use crate::ticketing::TicketingError;

/// Coarse classification of a system failure, surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A collaborator (database, ticketing system) failed.
    Upstream,
    /// The decision was made but the ticketing system refused the assignment.
    ExternalAssignment,
    Configuration,
    NotFound,
    Conflict,
    Validation,
}

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ticketing(#[from] TicketingError),

    #[error("external assignment failed: {source}")]
    ExternalAssignment {
        decision_id: Option<i64>,
        #[source]
        source: TicketingError,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AssignmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssignmentError::Store(e) => match e {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::FeedbackAlreadyRecorded(_) => ErrorKind::Conflict,
                StoreError::Settings(_) | StoreError::Corrupt { .. } => ErrorKind::Configuration,
                StoreError::Database(_) => ErrorKind::Upstream,
            },
            AssignmentError::Ticketing(TicketingError::NotFound(_)) => ErrorKind::NotFound,
            AssignmentError::Ticketing(_) => ErrorKind::Upstream,
            AssignmentError::ExternalAssignment { .. } => ErrorKind::ExternalAssignment,
            AssignmentError::InvalidSettings(_) => ErrorKind::Validation,
            AssignmentError::InvalidInput(_) => ErrorKind::Validation,
        }
    }

    /// Decision recorded before the failure, if any.
    pub fn decision_id(&self) -> Option<i64> {
        match self {
            AssignmentError::ExternalAssignment { decision_id, .. } => *decision_id,
            _ => None,
        }
    }
}

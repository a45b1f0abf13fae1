use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::policy::PolicyError;
use crate::session::UserId;
use crate::storage::StorageError;

/// Failure to deliver a reply or document through the transport.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("transport send failed: {0}")]
    Send(String),
}

/// Failures surfaced by the dialog service. Phrasing failures never appear
/// here: the phrasing adapter recovers them internally, so the transition
/// that triggered the call always completes.
#[derive(Debug, Error)]
pub enum DialogError {
    /// Session data the transition table guarantees was absent. The service
    /// recovers by resetting the user to the first document step.
    #[error("session data missing for user {user}")]
    MissingSession { user: UserId },
    #[error("dialog invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

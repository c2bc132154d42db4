//! Travel operation errors.

use crate::infrastructure::ports::RepoError;

/// Errors that can occur during travel operations. The session-state
/// variants are expected outcomes callers branch on, not faults.
#[derive(Debug, thiserror::Error)]
pub enum TravelError {
    #[error("Travel session not found")]
    SessionNotFound,
    #[error("Travel session already finished")]
    AlreadyFinished,
    #[error("Another travel session is already in progress")]
    AlreadyTraveling,
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

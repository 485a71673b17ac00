use tally_repository::RepositoryError;
use thiserror::Error;

/// Errors returned by every engine operation.
///
/// Whenever one of these is returned from a mutating call, nothing the call
/// touched was committed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User already voted for this option")]
    AlreadyVoted,

    #[error("Poll cannot be edited after votes have been cast")]
    PollCannotEdit,

    #[error("Poll is closed")]
    PollClosed,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("User is already a member of this community")]
    AlreadyMember,

    #[error("Member counter is unavailable")]
    CounterUnavailable,

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

//! Error types for storage, question banks, and the quiz engine.
//!
//! Storage errors are defined here rather than in `aptiq-store` so the
//! engine can classify them (unavailable vs. failed) without string
//! matching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`StorageBackend`](crate::storage::StorageBackend).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be opened.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend opened but an operation on it failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored document could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns `true` if the store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Errors loading or parsing a question bank file.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse question bank {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A question violates a record invariant.
    #[error("invalid question '{id}': {reason}")]
    InvalidQuestion { id: String, reason: String },
}

/// Errors surfaced by the quiz engine.
///
/// None of these are fatal: the service facade logs them and degrades to
/// emptier data instead of halting a quiz.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("question store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("seeding the question bank failed: {0}")]
    SeedFailure(#[source] StoreError),

    #[error("saving quiz session failed: {0}")]
    SessionSaveFailure(#[source] StoreError),

    /// Only completed sessions are archived.
    #[error("session {0} is not completed and cannot be archived")]
    IncompleteSession(uuid::Uuid),

    #[error("cannot start a session without questions")]
    EmptyQuestionList,

    #[error(transparent)]
    Bank(#[from] BankError),
}

impl QuizError {
    /// Wrap a storage error raised while seeding, keeping the
    /// unavailable/failed distinction.
    pub fn seeding(err: StoreError) -> Self {
        if err.is_unavailable() {
            QuizError::StoreUnavailable(err)
        } else {
            QuizError::SeedFailure(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_error_classification() {
        let unavailable = QuizError::seeding(StoreError::Unavailable("locked".into()));
        assert!(matches!(unavailable, QuizError::StoreUnavailable(_)));

        let failed = QuizError::seeding(StoreError::Backend("disk full".into()));
        assert!(matches!(failed, QuizError::SeedFailure(_)));
        assert!(failed.to_string().contains("disk full"));
    }
}

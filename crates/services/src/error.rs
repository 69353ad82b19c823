//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AnswerError, QuestionId, QuizResultError};
use storage::repository::StorageError;

/// Errors emitted by the quiz engine and its actor.
///
/// `EmptyBank` and `NoMistakes` are guards: the caller should tell the user
/// and stay idle rather than treat them as failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question bank is empty")]
    EmptyBank,
    #[error("no mistakes to review")]
    NoMistakes,
    #[error("no quiz is active")]
    NotActive,
    #[error("quiz already submitted")]
    Submitted,
    #[error("question {0} is not part of the current quiz")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Result(#[from] QuizResultError),
    #[error("quiz actor has stopped")]
    ActorClosed,
}

impl SessionError {
    /// True for conditions the user should simply be told about.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        matches!(self, SessionError::EmptyBank | SessionError::NoMistakes)
    }
}

/// Errors emitted by `RemoteQuizApi`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("remote rejected the request: {0}")]
    Rejected(String),
    #[error("error report needs a description")]
    EmptyReport,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<RemoteError> for StorageError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(message) => StorageError::Serialization(message),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

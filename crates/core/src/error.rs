use thiserror::Error;

use crate::model::{AnswerError, OptionIdError, QuestionError, QuizResultError, SettingsError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    OptionId(#[from] OptionIdError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Result(#[from] QuizResultError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

mod answer;
mod bank;
mod ids;
mod progress;
mod question;
mod session;
mod settings;

pub use ids::{OptionId, OptionIdError, ParseIdError, QuestionId, SessionId, UserId};

pub use answer::{AnswerEntry, AnswerError, AnswerSheet};
pub use bank::{BankChange, BankEvent, QuestionBank};
pub use progress::{AnsweredSet, MistakeLedger, UserProgress};
pub use question::{CorrectAnswer, Question, QuestionError, QuestionKind, QuestionOption};
pub use session::{QuizMode, QuizResult, QuizResultError, ResumeFragment, score_percent};
pub use settings::{QuizSettings, SettingsError};

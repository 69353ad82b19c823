#![forbid(unsafe_code)]

pub mod actor;
pub mod error;
pub mod remote;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use actor::{QuizActor, QuizEvent, QuizHandle, QuizSnapshot};
pub use error::{RemoteError, SessionError};
pub use remote::{RemoteQuizApi, decode_push_message};
pub use sessions::{Activity, ExamTick, QuizEngine, QuizSession, SessionProgress};

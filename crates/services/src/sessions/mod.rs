mod instant;
mod plan;
mod progress;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use instant::InstantDraw;
pub use plan::{draw_random, sample_exam, shuffle};
pub use progress::SessionProgress;
pub use service::{QuizSession, Submission};
pub use workflow::{Activity, ExamTick, QuizEngine};

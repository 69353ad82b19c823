use quiz_core::model::{QuizMode, SessionId};

/// Aggregated view of the active quiz, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub session_id: SessionId,
    pub mode: QuizMode,
    pub current_index: usize,
    pub total: usize,
    pub graded: usize,
    /// Exam countdown, `None` outside exams.
    pub remaining_seconds: Option<u32>,
    pub is_submitted: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.graded)
    }
}

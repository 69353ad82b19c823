use quiz_core::Grading;
use quiz_core::model::{AnswerSheet, OptionId, Question, QuizMode, SessionId};

use super::progress::SessionProgress;
use crate::error::SessionError;

/// A single random question answered outside any multi-question session.
///
/// Drawing again replaces the whole draw, answer state included.
#[derive(Debug, Clone)]
pub struct InstantDraw {
    id: SessionId,
    question: Question,
    answers: AnswerSheet,
}

impl InstantDraw {
    #[must_use]
    pub fn new(question: Question) -> Self {
        Self {
            id: SessionId::new(),
            question,
            answers: AnswerSheet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.answers.is_graded(self.question.id())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Answer` for a bad option or question kind.
    pub fn select_single(&mut self, option: OptionId) -> Result<Option<Grading>, SessionError> {
        Ok(self.answers.select_single(&self.question, option)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Answer` for a bad option or question kind.
    pub fn toggle_multiple(&mut self, option: OptionId) -> Result<bool, SessionError> {
        Ok(self.answers.toggle_multiple(&self.question, option)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Answer` for a single-choice question or an empty selection.
    pub fn confirm_multiple(&mut self) -> Result<Option<Grading>, SessionError> {
        Ok(self.answers.confirm_multiple(&self.question)?)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            session_id: self.id,
            mode: QuizMode::Instant,
            current_index: 0,
            total: 1,
            graded: usize::from(self.is_graded()),
            remaining_seconds: None,
            is_submitted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{CorrectAnswer, QuestionId, QuestionOption};

    fn multi() -> Question {
        Question::with_inferred_kind(
            QuestionId::new(5),
            "General",
            "Pick two",
            vec![
                QuestionOption::new(OptionId::A, "a"),
                QuestionOption::new(OptionId::B, "b"),
                QuestionOption::new(OptionId::C, "c"),
            ],
            CorrectAnswer::parse("B,A").unwrap(),
            "",
        )
        .unwrap()
    }

    #[test]
    fn grades_a_multiple_choice_draw_on_confirm() {
        let mut draw = InstantDraw::new(multi());
        assert!(draw.toggle_multiple(OptionId::B).unwrap());
        assert!(draw.toggle_multiple(OptionId::C).unwrap());
        assert!(draw.toggle_multiple(OptionId::C).unwrap());
        assert!(draw.toggle_multiple(OptionId::A).unwrap());
        assert!(!draw.is_graded());

        let grading = draw.confirm_multiple().unwrap().unwrap();
        assert!(grading.is_correct);
        assert_eq!(draw.progress().graded, 1);
    }

    #[test]
    fn single_operation_on_multiple_question_fails() {
        let mut draw = InstantDraw::new(multi());
        assert!(matches!(
            draw.select_single(OptionId::A),
            Err(SessionError::Answer(_))
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::answer::AnswerSheet;
use crate::model::ids::QuestionId;
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizResultError {
    #[error("submitted_at is before started_at")]
    InvalidTimeRange,

    #[error("correct ({correct}) + incorrect ({incorrect}) + unanswered ({unanswered}) != total ({total})")]
    CountMismatch {
        total: usize,
        correct: usize,
        incorrect: usize,
        unanswered: usize,
    },

    #[error("unknown quiz mode: {0}")]
    UnknownMode(String),
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// The four ways a user can quiz themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    /// Whole bank in bank order, resumable, untimed.
    Practice,
    /// Random sample under a countdown, never resumed.
    Exam,
    /// One random question at a time.
    Instant,
    /// Review of the questions currently in the mistake ledger.
    Mistakes,
}

impl QuizMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Practice => "practice",
            QuizMode::Exam => "exam",
            QuizMode::Instant => "instant",
            QuizMode::Mistakes => "mistakes",
        }
    }

    /// Parse a persisted mode name.
    ///
    /// # Errors
    ///
    /// Returns `QuizResultError::UnknownMode` for unrecognised names.
    pub fn parse(raw: &str) -> Result<Self, QuizResultError> {
        match raw.trim() {
            "practice" => Ok(Self::Practice),
            "exam" => Ok(Self::Exam),
            "instant" => Ok(Self::Instant),
            "mistakes" => Ok(Self::Mistakes),
            other => Err(QuizResultError::UnknownMode(other.to_string())),
        }
    }

    /// Only practice sessions survive leaving the screen.
    #[must_use]
    pub fn is_resumable(self) -> bool {
        matches!(self, QuizMode::Practice)
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Saved position and answers of a resumable session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeFragment {
    pub current_index: usize,
    pub answers: AnswerSheet,
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// `round(correct / total * 100)`, or zero for an empty attempt.
#[must_use]
pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let score = (correct as f64 / total as f64 * 100.0).round() as u32;
    score
}

/// Aggregate outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    mode: QuizMode,
    total: usize,
    correct: usize,
    incorrect: Vec<QuestionId>,
    unanswered: Vec<QuestionId>,
    score: u32,
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
}

impl QuizResult {
    /// Grade every question of an attempt from its raw answers.
    ///
    /// Unanswered questions, and multiple-choice selections never confirmed,
    /// count against the score.
    ///
    /// # Errors
    ///
    /// Returns `QuizResultError::InvalidTimeRange` if `submitted_at` is before `started_at`.
    pub fn tally(
        mode: QuizMode,
        questions: &[Question],
        answers: &AnswerSheet,
        started_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, QuizResultError> {
        let mut correct = 0_usize;
        let mut incorrect = Vec::new();
        let mut unanswered = Vec::new();

        for question in questions {
            match answers.grade(question) {
                Some(true) => correct += 1,
                Some(false) => incorrect.push(question.id()),
                None => unanswered.push(question.id()),
            }
        }

        Self::from_parts(
            mode,
            questions.len(),
            correct,
            incorrect,
            unanswered,
            started_at,
            submitted_at,
        )
    }

    /// Rebuild a result from stored parts.
    ///
    /// # Errors
    ///
    /// Returns `QuizResultError::CountMismatch` when the parts do not add up to
    /// `total`, or `QuizResultError::InvalidTimeRange` for a reversed time range.
    pub fn from_parts(
        mode: QuizMode,
        total: usize,
        correct: usize,
        incorrect: Vec<QuestionId>,
        unanswered: Vec<QuestionId>,
        started_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, QuizResultError> {
        if submitted_at < started_at {
            return Err(QuizResultError::InvalidTimeRange);
        }
        if correct + incorrect.len() + unanswered.len() != total {
            return Err(QuizResultError::CountMismatch {
                total,
                correct,
                incorrect: incorrect.len(),
                unanswered: unanswered.len(),
            });
        }

        Ok(Self {
            mode,
            total,
            correct,
            score: score_percent(correct, total),
            incorrect,
            unanswered,
            started_at,
            submitted_at,
        })
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> &[QuestionId] {
        &self.incorrect
    }

    #[must_use]
    pub fn unanswered(&self) -> &[QuestionId] {
        &self.unanswered
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrectAnswer, OptionId, QuestionOption};
    use crate::time::fixed_now;

    fn question(id: u64, correct: &str) -> Question {
        Question::with_inferred_kind(
            QuestionId::new(id),
            "General",
            format!("Q{id}"),
            vec![
                QuestionOption::new(OptionId::A, "a"),
                QuestionOption::new(OptionId::B, "b"),
                QuestionOption::new(OptionId::C, "c"),
            ],
            CorrectAnswer::parse(correct).unwrap(),
            "",
        )
        .unwrap()
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(7, 7), 100);
    }

    #[test]
    fn tally_splits_correct_incorrect_unanswered() {
        let questions = vec![question(1, "A"), question(2, "B"), question(3, "A,C"), question(4, "C")];
        let mut answers = AnswerSheet::new();
        answers.select_single(&questions[0], OptionId::A).unwrap();
        answers.select_single(&questions[1], OptionId::C).unwrap();
        answers.toggle_multiple(&questions[2], OptionId::A).unwrap();

        let result = QuizResult::tally(
            QuizMode::Exam,
            &questions,
            &answers,
            fixed_now(),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(result.total(), 4);
        assert_eq!(result.correct(), 1);
        assert_eq!(result.incorrect(), &[QuestionId::new(2)]);
        assert_eq!(result.unanswered(), &[QuestionId::new(3), QuestionId::new(4)]);
        assert_eq!(result.score(), 25);
    }

    #[test]
    fn rejects_reversed_time_range() {
        let err = QuizResult::tally(
            QuizMode::Practice,
            &[],
            &AnswerSheet::new(),
            fixed_now(),
            fixed_now() - chrono::Duration::seconds(1),
        )
        .unwrap_err();
        assert_eq!(err, QuizResultError::InvalidTimeRange);
    }

    #[test]
    fn from_parts_checks_counts() {
        let err = QuizResult::from_parts(
            QuizMode::Mistakes,
            3,
            1,
            vec![QuestionId::new(1)],
            Vec::new(),
            fixed_now(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, QuizResultError::CountMismatch { total: 3, .. }));
    }

    #[test]
    fn only_practice_is_resumable() {
        assert!(QuizMode::Practice.is_resumable());
        assert!(!QuizMode::Exam.is_resumable());
        assert!(!QuizMode::Mistakes.is_resumable());
        assert_eq!(QuizMode::parse("mistakes").unwrap(), QuizMode::Mistakes);
    }
}

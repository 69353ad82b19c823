use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{OptionId, OptionIdError, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least two options, got {count}")]
    TooFewOptions { count: usize },

    #[error("option {option} appears more than once")]
    DuplicateOption { option: OptionId },

    #[error("option {option} has no text")]
    EmptyOptionText { option: OptionId },

    #[error("correct answer cannot be empty")]
    EmptyCorrectAnswer,

    #[error("correct answer lists {option} more than once")]
    DuplicateCorrectLetter { option: OptionId },

    #[error("correct answer refers to missing option {option}")]
    UnknownCorrectOption { option: OptionId },

    #[error("question type {kind} does not match {letters} correct letter(s)")]
    KindMismatch { kind: QuestionKind, letters: usize },

    #[error("unknown question type: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    OptionId(#[from] OptionIdError),
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// Whether a question takes one letter or a set of letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
        }
    }

    /// Parse the persisted type name.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownKind` for names other than `single`/`multiple`.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        match raw.trim() {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            other => Err(QuestionError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CORRECT ANSWER ────────────────────────────────────────────────────────────
//

/// The letters a question accepts, as written in the bank (`"B"` or `"A,C"`).
///
/// Letters keep their authored order for display; comparisons go through
/// [`CorrectAnswer::sorted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectAnswer {
    letters: Vec<OptionId>,
}

impl CorrectAnswer {
    /// Parse a comma-separated list of letters. Whitespace around letters is
    /// trimmed and empty segments are skipped.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyCorrectAnswer` when no letter is present,
    /// `QuestionError::DuplicateCorrectLetter` when a letter repeats, or an
    /// option id error for anything that is not a letter in `A..=D`.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let mut letters = Vec::new();
        for segment in raw.split(',') {
            if segment.trim().is_empty() {
                continue;
            }
            let option = OptionId::parse(segment)?;
            if letters.contains(&option) {
                return Err(QuestionError::DuplicateCorrectLetter { option });
            }
            letters.push(option);
        }
        if letters.is_empty() {
            return Err(QuestionError::EmptyCorrectAnswer);
        }
        Ok(Self { letters })
    }

    #[must_use]
    pub fn letters(&self) -> &[OptionId] {
        &self.letters
    }

    /// Letters in lexicographic order.
    #[must_use]
    pub fn sorted(&self) -> Vec<OptionId> {
        let mut sorted = self.letters.clone();
        sorted.sort();
        sorted
    }

    #[must_use]
    pub fn single(&self) -> Option<OptionId> {
        match self.letters.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

impl fmt::Display for CorrectAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, letter) in self.letters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One labelled answer choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: OptionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    category: String,
    text: String,
    options: Vec<QuestionOption>,
    correct: CorrectAnswer,
    explanation: String,
    kind: QuestionKind,
}

impl Question {
    /// Build a question, enforcing the bank invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the text is blank, options are fewer than
    /// two, repeated or blank, the correct answer names a missing option, or
    /// `kind` disagrees with the number of correct letters.
    pub fn new(
        id: QuestionId,
        category: impl Into<String>,
        text: impl Into<String>,
        options: Vec<QuestionOption>,
        correct: CorrectAnswer,
        explanation: impl Into<String>,
        kind: QuestionKind,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: options.len(),
            });
        }

        let mut seen = BTreeSet::new();
        for option in &options {
            if !seen.insert(option.id) {
                return Err(QuestionError::DuplicateOption { option: option.id });
            }
            if option.text.trim().is_empty() {
                return Err(QuestionError::EmptyOptionText { option: option.id });
            }
        }

        if let Some(missing) = correct.letters().iter().find(|l| !seen.contains(l)) {
            return Err(QuestionError::UnknownCorrectOption { option: *missing });
        }

        let expected = if correct.len() >= 2 {
            QuestionKind::Multiple
        } else {
            QuestionKind::Single
        };
        if kind != expected {
            return Err(QuestionError::KindMismatch {
                kind,
                letters: correct.len(),
            });
        }

        Ok(Self {
            id,
            category: category.into(),
            text,
            options,
            correct,
            explanation: explanation.into(),
            kind,
        })
    }

    /// Convenience constructor deriving the kind from the correct answer.
    ///
    /// # Errors
    ///
    /// Same as [`Question::new`].
    pub fn with_inferred_kind(
        id: QuestionId,
        category: impl Into<String>,
        text: impl Into<String>,
        options: Vec<QuestionOption>,
        correct: CorrectAnswer,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let kind = if correct.len() >= 2 {
            QuestionKind::Multiple
        } else {
            QuestionKind::Single
        };
        Self::new(id, category, text, options, correct, explanation, kind)
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &CorrectAnswer {
        &self.correct
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize) -> Vec<QuestionOption> {
        [OptionId::A, OptionId::B, OptionId::C, OptionId::D]
            .into_iter()
            .take(n)
            .map(|id| QuestionOption::new(id, format!("option {id}")))
            .collect()
    }

    fn build(correct: &str, kind: QuestionKind) -> Result<Question, QuestionError> {
        Question::new(
            QuestionId::new(1),
            "Networking",
            "Which layer?",
            options(4),
            CorrectAnswer::parse(correct)?,
            "",
            kind,
        )
    }

    #[test]
    fn correct_answer_trims_and_keeps_authored_order() {
        let answer = CorrectAnswer::parse(" C , A ").unwrap();
        assert_eq!(answer.letters(), &[OptionId::C, OptionId::A]);
        assert_eq!(answer.sorted(), vec![OptionId::A, OptionId::C]);
        assert_eq!(answer.to_string(), "C,A");
    }

    #[test]
    fn correct_answer_rejects_empty_and_duplicates() {
        assert_eq!(
            CorrectAnswer::parse(" , ").unwrap_err(),
            QuestionError::EmptyCorrectAnswer
        );
        assert!(matches!(
            CorrectAnswer::parse("A,a").unwrap_err(),
            QuestionError::DuplicateCorrectLetter { .. }
        ));
    }

    #[test]
    fn single_letter_builds_single_question() {
        let q = build("B", QuestionKind::Single).unwrap();
        assert_eq!(q.correct_answer().single(), Some(OptionId::B));
    }

    #[test]
    fn kind_must_match_letter_count() {
        let err = build("A,C", QuestionKind::Single).unwrap_err();
        assert_eq!(
            err,
            QuestionError::KindMismatch {
                kind: QuestionKind::Single,
                letters: 2
            }
        );
        assert!(build("A", QuestionKind::Multiple).is_err());
        assert!(build("A,C", QuestionKind::Multiple).is_ok());
    }

    #[test]
    fn correct_letter_must_exist_among_options() {
        let err = Question::new(
            QuestionId::new(2),
            "",
            "Pick",
            options(2),
            CorrectAnswer::parse("C").unwrap(),
            "",
            QuestionKind::Single,
        )
        .unwrap_err();
        assert_eq!(
            err,
            QuestionError::UnknownCorrectOption {
                option: OptionId::C
            }
        );
    }

    #[test]
    fn rejects_blank_text_and_too_few_options() {
        let blank = Question::with_inferred_kind(
            QuestionId::new(3),
            "",
            "   ",
            options(2),
            CorrectAnswer::parse("A").unwrap(),
            "",
        );
        assert_eq!(blank.unwrap_err(), QuestionError::EmptyText);

        let few = Question::with_inferred_kind(
            QuestionId::new(3),
            "",
            "Pick",
            options(1),
            CorrectAnswer::parse("A").unwrap(),
            "",
        );
        assert_eq!(few.unwrap_err(), QuestionError::TooFewOptions { count: 1 });
    }

    #[test]
    fn kind_parses_persisted_names() {
        assert_eq!(QuestionKind::parse("multiple").unwrap(), QuestionKind::Multiple);
        assert!(QuestionKind::parse("essay").is_err());
    }
}

//! The one place correctness is decided.
//!
//! Selection time, confirmation time, submission and result rendering all call
//! into this module, so the comparison rules cannot drift between call sites.

use crate::model::{AnswerEntry, CorrectAnswer, OptionId, Question, QuestionId};

/// Outcome of grading one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grading {
    pub question_id: QuestionId,
    pub is_correct: bool,
}

/// A single-choice answer is correct when it equals the lone correct letter.
#[must_use]
pub fn grade_single(correct: &CorrectAnswer, selected: OptionId) -> bool {
    correct.single() == Some(selected)
}

/// A multiple-choice answer is correct when the sorted selection equals the
/// sorted correct letters exactly.
///
/// Selection order never matters; any extra or missing letter fails.
#[must_use]
pub fn grade_multiple<'a>(
    correct: &CorrectAnswer,
    selected: impl IntoIterator<Item = &'a OptionId>,
) -> bool {
    let mut chosen: Vec<OptionId> = selected.into_iter().copied().collect();
    chosen.sort();
    chosen == correct.sorted()
}

/// Grade a stored entry against its question.
///
/// Returns `None` while the entry is not final: unanswered, or a
/// multiple-choice selection that has not been confirmed yet.
#[must_use]
pub fn grade_entry(question: &Question, entry: &AnswerEntry) -> Option<bool> {
    match entry {
        AnswerEntry::Unanswered => None,
        AnswerEntry::Single { selected } => Some(grade_single(question.correct_answer(), *selected)),
        AnswerEntry::Multiple {
            selected,
            confirmed: true,
        } => Some(grade_multiple(question.correct_answer(), selected)),
        AnswerEntry::Multiple {
            confirmed: false, ..
        } => None,
    }
}

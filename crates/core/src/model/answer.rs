use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::grading::{Grading, grade_entry};
use crate::model::ids::{OptionId, QuestionId};
use crate::model::question::{Question, QuestionKind};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {question} has no option {option}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {question} is {kind}-choice")]
    WrongKind {
        question: QuestionId,
        kind: QuestionKind,
    },

    #[error("question {question} has no selection to confirm")]
    NothingSelected { question: QuestionId },
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// Recorded answer state for one question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerEntry {
    #[default]
    Unanswered,
    /// Locked on first selection.
    Single { selected: OptionId },
    /// Toggleable until confirmed.
    Multiple {
        selected: BTreeSet<OptionId>,
        confirmed: bool,
    },
}

impl AnswerEntry {
    /// True once the entry is final and can be graded.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            AnswerEntry::Single { .. }
                | AnswerEntry::Multiple {
                    confirmed: true,
                    ..
                }
        )
    }

    #[must_use]
    pub fn is_selected(&self, option: OptionId) -> bool {
        match self {
            AnswerEntry::Unanswered => false,
            AnswerEntry::Single { selected } => *selected == option,
            AnswerEntry::Multiple { selected, .. } => selected.contains(&option),
        }
    }
}

static UNANSWERED: AnswerEntry = AnswerEntry::Unanswered;

//
// ─── SHEET ─────────────────────────────────────────────────────────────────────
//

/// Answer state for a set of questions, keyed by question id.
///
/// Single-choice answers are write-once. Multiple-choice answers toggle freely
/// until confirmed, after which they are frozen. Grading is never cached here:
/// callers recompute it from the raw entries through [`crate::grading`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSheet {
    entries: BTreeMap<QuestionId, AnswerEntry>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a single-choice selection and grade it.
    ///
    /// Returns `Ok(None)` without touching state when the question already has
    /// an answer.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::WrongKind` for a multiple-choice question and
    /// `AnswerError::UnknownOption` when the letter is not one of its options.
    pub fn select_single(
        &mut self,
        question: &Question,
        option: OptionId,
    ) -> Result<Option<Grading>, AnswerError> {
        ensure_kind(question, QuestionKind::Single)?;
        ensure_option(question, option)?;

        if self.entries.contains_key(&question.id()) {
            return Ok(None);
        }

        self.entries
            .insert(question.id(), AnswerEntry::Single { selected: option });
        Ok(self.grade(question).map(|is_correct| Grading {
            question_id: question.id(),
            is_correct,
        }))
    }

    /// Flip `option` in a multiple-choice selection. Nothing is graded.
    ///
    /// Returns whether the selection changed; toggling a confirmed answer is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::WrongKind` for a single-choice question and
    /// `AnswerError::UnknownOption` when the letter is not one of its options.
    pub fn toggle_multiple(
        &mut self,
        question: &Question,
        option: OptionId,
    ) -> Result<bool, AnswerError> {
        ensure_kind(question, QuestionKind::Multiple)?;
        ensure_option(question, option)?;

        let entry = self
            .entries
            .entry(question.id())
            .or_insert_with(|| AnswerEntry::Multiple {
                selected: BTreeSet::new(),
                confirmed: false,
            });

        match entry {
            AnswerEntry::Multiple {
                confirmed: false,
                selected,
            } => {
                if !selected.remove(&option) {
                    selected.insert(option);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Freeze a multiple-choice selection and grade it.
    ///
    /// Returns `Ok(None)` when the answer was already confirmed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::WrongKind` for a single-choice question and
    /// `AnswerError::NothingSelected` when no letter is selected.
    pub fn confirm_multiple(&mut self, question: &Question) -> Result<Option<Grading>, AnswerError> {
        ensure_kind(question, QuestionKind::Multiple)?;

        match self.entries.get_mut(&question.id()) {
            Some(AnswerEntry::Multiple {
                confirmed: true, ..
            }) => return Ok(None),
            Some(AnswerEntry::Multiple {
                selected,
                confirmed,
            }) if !selected.is_empty() => *confirmed = true,
            _ => {
                return Err(AnswerError::NothingSelected {
                    question: question.id(),
                });
            }
        }

        Ok(self.grade(question).map(|is_correct| Grading {
            question_id: question.id(),
            is_correct,
        }))
    }

    /// Confirm every pending multiple-choice selection among `questions` and
    /// return the resulting gradings.
    ///
    /// Empty selections are left alone; they count as unanswered.
    pub fn confirm_pending<'a>(
        &mut self,
        questions: impl IntoIterator<Item = &'a Question>,
    ) -> Vec<Grading> {
        let mut graded = Vec::new();
        for question in questions {
            if question.kind() != QuestionKind::Multiple {
                continue;
            }
            let pending = matches!(
                self.entries.get(&question.id()),
                Some(AnswerEntry::Multiple { selected, confirmed: false }) if !selected.is_empty()
            );
            if pending && let Ok(Some(grading)) = self.confirm_multiple(question) {
                graded.push(grading);
            }
        }
        graded
    }

    /// True once the question has a final answer.
    #[must_use]
    pub fn is_graded(&self, id: QuestionId) -> bool {
        self.entries.get(&id).is_some_and(AnswerEntry::is_final)
    }

    /// Recompute correctness from the stored entry.
    #[must_use]
    pub fn grade(&self, question: &Question) -> Option<bool> {
        grade_entry(question, self.entry(question.id()))
    }

    #[must_use]
    pub fn entry(&self, id: QuestionId) -> &AnswerEntry {
        self.entries.get(&id).unwrap_or(&UNANSWERED)
    }

    #[must_use]
    pub fn graded_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_final()).count()
    }

    /// Drop entries whose question id fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(QuestionId) -> bool) {
        self.entries.retain(|id, _| keep(*id));
    }

    pub fn clear(&mut self, id: QuestionId) {
        self.entries.remove(&id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &AnswerEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn ensure_kind(question: &Question, expected: QuestionKind) -> Result<(), AnswerError> {
    if question.kind() == expected {
        Ok(())
    } else {
        Err(AnswerError::WrongKind {
            question: question.id(),
            kind: question.kind(),
        })
    }
}

fn ensure_option(question: &Question, option: OptionId) -> Result<(), AnswerError> {
    if question.has_option(option) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption {
            question: question.id(),
            option,
        })
    }
}

use std::collections::BTreeMap;

use crate::model::{QuestionBank, UserProgress};

/// Progress within one category of the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryStats {
    pub total: usize,
    pub answered: usize,
    /// Answered and not currently in the mistake ledger.
    pub correct: usize,
}

impl CategoryStats {
    /// Share of the category attempted, rounded to a whole percent.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        crate::model::score_percent(self.answered, self.total)
    }

    /// Share of attempted questions currently right, rounded to a whole percent.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        crate::model::score_percent(self.correct, self.answered)
    }
}

/// Dashboard numbers for one user against the current bank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub total_questions: usize,
    pub total_answered: usize,
    pub total_wrong: usize,
    /// One-decimal percentage, see [`UserProgress::accuracy`].
    pub accuracy: f64,
    pub categories: BTreeMap<String, CategoryStats>,
}

impl UserStats {
    /// Ids in `progress` that the bank no longer holds still count towards the
    /// totals but are left out of the per-category breakdown.
    #[must_use]
    pub fn compute(bank: &QuestionBank, progress: &UserProgress) -> Self {
        let mut categories: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for question in bank.all() {
            let entry = categories.entry(question.category().to_string()).or_default();
            entry.total += 1;
            if progress.answered.contains(question.id()) {
                entry.answered += 1;
                if !progress.mistakes.contains(question.id()) {
                    entry.correct += 1;
                }
            }
        }

        Self {
            total_questions: bank.count(),
            total_answered: progress.answered.len(),
            total_wrong: progress.mistakes.len(),
            accuracy: progress.accuracy(),
            categories,
        }
    }
}

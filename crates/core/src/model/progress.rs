use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::grading::Grading;
use crate::model::ids::QuestionId;

/// Question ids the user currently has wrong.
///
/// Reflects only the latest grading per question: a correct answer removes the
/// id, a wrong one adds it. There is no error count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MistakeLedger {
    ids: BTreeSet<QuestionId>,
}

impl MistakeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a grading outcome. Returns whether membership changed.
    pub fn record_outcome(&mut self, id: QuestionId, is_correct: bool) -> bool {
        if is_correct {
            self.ids.remove(&id)
        } else {
            self.ids.insert(id)
        }
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<QuestionId> for MistakeLedger {
    fn from_iter<T: IntoIterator<Item = QuestionId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Every question id ever attempted. Only grows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnsweredSet {
    ids: BTreeSet<QuestionId>,
}

impl AnsweredSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the id was not seen before.
    pub fn insert(&mut self, id: QuestionId) -> bool {
        self.ids.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<QuestionId> for AnsweredSet {
    fn from_iter<T: IntoIterator<Item = QuestionId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Per-user progress: what was attempted and what is currently wrong.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProgress {
    #[serde(rename = "answeredIds")]
    pub answered: AnsweredSet,
    #[serde(rename = "wrongIds")]
    pub mistakes: MistakeLedger,
}

impl UserProgress {
    #[must_use]
    pub fn new(answered: AnsweredSet, mistakes: MistakeLedger) -> Self {
        Self { answered, mistakes }
    }

    /// Fold one grading into the answered set and the mistake ledger.
    pub fn record(&mut self, grading: Grading) {
        self.answered.insert(grading.question_id);
        self.mistakes
            .record_outcome(grading.question_id, grading.is_correct);
    }

    /// Share of answered questions not currently wrong, as a percentage
    /// rounded to one decimal. Zero when nothing has been answered.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let answered = self.answered.len();
        if answered == 0 {
            return 0.0;
        }
        let right = answered.saturating_sub(self.mistakes.len());
        #[allow(clippy::cast_precision_loss)]
        let pct = right as f64 / answered as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: u64) -> QuestionId {
        QuestionId::new(id)
    }

    #[test]
    fn ledger_is_idempotent() {
        let mut ledger = MistakeLedger::new();

        assert!(!ledger.record_outcome(q(1), true));
        assert!(!ledger.record_outcome(q(1), true));
        assert!(!ledger.contains(q(1)));

        assert!(ledger.record_outcome(q(1), false));
        assert!(!ledger.record_outcome(q(1), false));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn correct_answer_erases_wrong_status() {
        let mut ledger: MistakeLedger = [q(2), q(3)].into_iter().collect();
        ledger.record_outcome(q(2), true);
        assert_eq!(ledger.iter().collect::<Vec<_>>(), vec![q(3)]);
    }

    #[test]
    fn record_grows_answered_and_tracks_latest_outcome() {
        let mut progress = UserProgress::default();
        progress.record(Grading {
            question_id: q(1),
            is_correct: false,
        });
        progress.record(Grading {
            question_id: q(1),
            is_correct: true,
        });

        assert!(progress.answered.contains(q(1)));
        assert!(progress.mistakes.is_empty());
    }

    #[test]
    fn accuracy_rounds_to_one_decimal() {
        let progress = UserProgress::new(
            [q(1), q(2), q(3)].into_iter().collect(),
            [q(3)].into_iter().collect(),
        );
        assert!((progress.accuracy() - 66.7).abs() < f64::EPSILON);
        assert!(UserProgress::default().accuracy().abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let progress = UserProgress::new([q(1)].into_iter().collect(), MistakeLedger::new());
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["answeredIds"], serde_json::json!([1]));
        assert_eq!(json["wrongIds"], serde_json::json!([]));
    }
}

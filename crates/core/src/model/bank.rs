use crate::model::ids::QuestionId;
use crate::model::question::Question;

/// Change pushed by whoever administers the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankEvent {
    Added(Question),
    Updated(Question),
    Deleted(QuestionId),
    /// The whole bank was replaced; the caller must re-fetch it.
    ReplacedAll,
}

/// What applying a [`BankEvent`] did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankChange {
    Inserted(QuestionId),
    Replaced(QuestionId),
    Removed(QuestionId),
    /// A deletion named an id the snapshot does not hold.
    Missing(QuestionId),
    RefetchRequired,
}

/// Ordered snapshot of the question bank.
///
/// Ids are unique: loading a list with repeated ids keeps the position of the
/// first occurrence and the content of the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let mut bank = Self::default();
        bank.replace_all(questions);
        bank
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn all(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn by_id(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.by_id(id).is_some()
    }

    /// Clone out the questions matching `predicate`, in bank order.
    pub fn filter(&self, mut predicate: impl FnMut(&Question) -> bool) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|q| predicate(q))
            .cloned()
            .collect()
    }

    pub fn replace_all(&mut self, questions: Vec<Question>) {
        self.questions.clear();
        for question in questions {
            self.upsert(question);
        }
    }

    /// Apply one pushed change.
    pub fn apply(&mut self, event: BankEvent) -> BankChange {
        match event {
            BankEvent::Added(question) | BankEvent::Updated(question) => self.upsert(question),
            BankEvent::Deleted(id) => {
                let before = self.questions.len();
                self.questions.retain(|q| q.id() != id);
                if self.questions.len() < before {
                    BankChange::Removed(id)
                } else {
                    BankChange::Missing(id)
                }
            }
            BankEvent::ReplacedAll => BankChange::RefetchRequired,
        }
    }

    fn upsert(&mut self, question: Question) -> BankChange {
        let id = question.id();
        match self.questions.iter_mut().find(|q| q.id() == id) {
            Some(slot) => {
                *slot = question;
                BankChange::Replaced(id)
            }
            None => {
                self.questions.push(question);
                BankChange::Inserted(id)
            }
        }
    }
}

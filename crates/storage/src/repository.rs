use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    CorrectAnswer, OptionId, Question, QuestionError, QuestionId, QuestionKind, QuestionOption,
    QuizMode, ResumeFragment, UserId, UserProgress,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

fn default_category() -> String {
    "Uncategorized".to_string()
}

fn default_kind() -> String {
    QuestionKind::Single.as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: String,
    pub text: String,
}

/// Wire and persisted shape of a question.
///
/// Mirrors the JSON the bank is authored in: `correctAnswer` is a
/// comma-separated letter list and `type` is `single` or `multiple`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: u64,
    #[serde(default = "default_category")]
    pub category: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<OptionRecord>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id().value(),
            category: question.category().to_owned(),
            question: question.text().to_owned(),
            options: question
                .options()
                .iter()
                .map(|o| OptionRecord {
                    id: o.id.to_string(),
                    text: o.text.clone(),
                })
                .collect(),
            correct_answer: question.correct_answer().to_string(),
            explanation: question.explanation().to_owned(),
            kind: question.kind().as_str().to_owned(),
        }
    }

    /// Validate the record into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if any option id, the answer key or the kind is invalid.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let options = self
            .options
            .into_iter()
            .map(|o| Ok(QuestionOption::new(OptionId::parse(&o.id)?, o.text)))
            .collect::<Result<Vec<_>, QuestionError>>()?;
        let correct = CorrectAnswer::parse(&self.correct_answer)?;
        let kind = QuestionKind::parse(&self.kind)?;
        let category = if self.category.trim().is_empty() {
            default_category()
        } else {
            self.category
        };
        Question::new(
            QuestionId::new(self.id),
            category,
            self.question,
            options,
            correct,
            self.explanation,
            kind,
        )
    }

    /// Validate a batch, dropping and logging the records that fail.
    #[must_use]
    pub fn decode_all(records: Vec<Self>) -> Vec<Question> {
        let mut questions = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id;
            match record.into_question() {
                Ok(q) => questions.push(q),
                Err(e) => tracing::warn!(question.id = id, error = %e, "skipping invalid question"),
            }
        }
        questions
    }
}

/// Persisted shape of a user's progress, with derived totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: u64,
    pub answered_ids: Vec<u64>,
    pub wrong_ids: Vec<u64>,
    pub total_answered: usize,
    pub total_wrong: usize,
    pub accuracy: f64,
    pub last_updated: DateTime<Utc>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_progress(user: UserId, progress: &UserProgress, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.value(),
            answered_ids: progress.answered.iter().map(|id| id.value()).collect(),
            wrong_ids: progress.mistakes.iter().map(|id| id.value()).collect(),
            total_answered: progress.answered.len(),
            total_wrong: progress.mistakes.len(),
            accuracy: progress.accuracy(),
            last_updated: now,
        }
    }

    #[must_use]
    pub fn into_progress(self) -> UserProgress {
        UserProgress::new(
            self.answered_ids.into_iter().map(QuestionId::new).collect(),
            self.wrong_ids.into_iter().map(QuestionId::new).collect(),
        )
    }
}

//
// ─── PORTS ─────────────────────────────────────────────────────────────────────
//

/// Read side of the question bank.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch every valid question in bank order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError>;
}

/// Write side of the question bank, used by the seeder and bank administration.
#[async_trait]
pub trait QuestionCatalog: QuestionSource {
    /// Insert a question at the end of the bank, or replace it in place.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Remove a question. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError>;

    /// Replace the whole bank, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; the old bank is left intact.
    async fn replace_all(&self, questions: &[Question]) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Overwrite the stored progress of `user`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the progress cannot be stored.
    async fn save_progress(&self, user: UserId, progress: &UserProgress)
    -> Result<(), StorageError>;

    /// Load the progress of `user`, empty if none was ever saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn load_progress(&self, user: UserId) -> Result<UserProgress, StorageError>;
}

/// Saved position of resumable sessions, keyed by user and mode.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the fragment cannot be stored.
    async fn save_resume(
        &self,
        user: UserId,
        mode: QuizMode,
        fragment: &ResumeFragment,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn load_resume(
        &self,
        user: UserId,
        mode: QuizMode,
    ) -> Result<Option<ResumeFragment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn clear_resume(&self, user: UserId, mode: QuizMode) -> Result<(), StorageError>;
}

//
// ─── IN MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Vec<Question>>>,
    progress: Arc<Mutex<HashMap<UserId, UserProgress>>>,
    resume: Arc<Mutex<HashMap<(UserId, QuizMode), ResumeFragment>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            questions: Arc::new(Mutex::new(questions)),
            ..Self::default()
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl QuestionCatalog for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        match guard.iter_mut().find(|q| q.id() == question.id()) {
            Some(slot) => *slot = question.clone(),
            None => guard.push(question.clone()),
        }
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|q| q.id() != id);
        Ok(guard.len() < before)
    }

    async fn replace_all(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        *guard = questions.to_vec();
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn save_progress(
        &self,
        user: UserId,
        progress: &UserProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert(user, progress.clone());
        Ok(())
    }

    async fn load_progress(&self, user: UserId) -> Result<UserProgress, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&user).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ResumeRepository for InMemoryRepository {
    async fn save_resume(
        &self,
        user: UserId,
        mode: QuizMode,
        fragment: &ResumeFragment,
    ) -> Result<(), StorageError> {
        let mut guard = self.resume.lock().map_err(poisoned)?;
        guard.insert((user, mode), fragment.clone());
        Ok(())
    }

    async fn load_resume(
        &self,
        user: UserId,
        mode: QuizMode,
    ) -> Result<Option<ResumeFragment>, StorageError> {
        let guard = self.resume.lock().map_err(poisoned)?;
        Ok(guard.get(&(user, mode)).cloned())
    }

    async fn clear_resume(&self, user: UserId, mode: QuizMode) -> Result<(), StorageError> {
        let mut guard = self.resume.lock().map_err(poisoned)?;
        guard.remove(&(user, mode));
        Ok(())
    }
}

/// Aggregates the quiz ports behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub progress: Arc<dyn ProgressRepository>,
    pub resume: Arc<dyn ResumeRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionSource> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let resume: Arc<dyn ResumeRepository> = Arc::new(repo);
        Self {
            questions,
            progress,
            resume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quiz_core::model::AnswerSheet;

    fn sample_json() -> &'static str {
        r#"[
            {"id": 1, "category": "Sensors", "question": "Which sensor measures tilt?",
             "options": [{"id": "A", "text": "Thermistor"}, {"id": "B", "text": "Accelerometer"}],
             "correctAnswer": "B", "explanation": "Gravity vector."},
            {"id": 2, "question": "Pick the transport protocols",
             "options": [{"id": "A", "text": "TCP"}, {"id": "B", "text": "UDP"}, {"id": "C", "text": "HTML"}],
             "correctAnswer": "A,B", "type": "multiple"},
            {"id": 3, "question": "Broken", "options": [{"id": "A", "text": "only"}], "correctAnswer": "A"}
        ]"#
    }

    #[test]
    fn decodes_wire_records_with_defaults() {
        let records: Vec<QuestionRecord> = serde_json::from_str(sample_json()).unwrap();
        let questions = QuestionRecord::decode_all(records);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].kind(), QuestionKind::Single);
        assert_eq!(questions[1].category(), "Uncategorized");
        assert_eq!(questions[1].kind(), QuestionKind::Multiple);
        assert_eq!(questions[1].correct_answer().to_string(), "A,B");
    }

    #[test]
    fn record_round_trips_through_question() {
        let records: Vec<QuestionRecord> = serde_json::from_str(sample_json()).unwrap();
        let original = records[1].clone();
        let question = original.clone().into_question().unwrap();
        let back = QuestionRecord::from_question(&question);
        assert_eq!(back.category, "Uncategorized");
        assert_eq!(back.kind, "multiple");
        assert_eq!(back.options, original.options);
    }

    #[test]
    fn progress_record_carries_totals() {
        let progress = UserProgress::new(
            [1, 2, 3].into_iter().map(QuestionId::new).collect(),
            [2].into_iter().map(QuestionId::new).collect(),
        );
        let record =
            ProgressRecord::from_progress(UserId::new(7), &progress, quiz_core::time::fixed_now());
        assert_eq!(record.total_answered, 3);
        assert_eq!(record.total_wrong, 1);
        assert!((record.accuracy - 66.7).abs() < f64::EPSILON);
        assert_eq!(record.into_progress(), progress);
    }

    #[tokio::test]
    async fn in_memory_progress_defaults_to_empty() {
        let repo = InMemoryRepository::new();
        let loaded = repo.load_progress(UserId::new(1)).await.unwrap();
        assert!(loaded.answered.is_empty());
        assert!(loaded.mistakes.is_empty());
    }

    #[tokio::test]
    async fn in_memory_resume_is_keyed_by_mode() {
        let repo = InMemoryRepository::new();
        let fragment = ResumeFragment {
            current_index: 4,
            answers: AnswerSheet::new(),
        };
        repo.save_resume(UserId::new(1), QuizMode::Practice, &fragment)
            .await
            .unwrap();

        assert_eq!(
            repo.load_resume(UserId::new(1), QuizMode::Practice)
                .await
                .unwrap(),
            Some(fragment)
        );
        assert_eq!(
            repo.load_resume(UserId::new(1), QuizMode::Exam).await.unwrap(),
            None
        );

        repo.clear_resume(UserId::new(1), QuizMode::Practice)
            .await
            .unwrap();
        assert_eq!(
            repo.load_resume(UserId::new(1), QuizMode::Practice)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn catalog_upsert_keeps_position() {
        let records: Vec<QuestionRecord> = serde_json::from_str(sample_json()).unwrap();
        let questions = QuestionRecord::decode_all(records);
        let repo = InMemoryRepository::with_questions(questions.clone());

        repo.upsert_question(&questions[0]).await.unwrap();
        let ids: Vec<_> = repo
            .fetch_all()
            .await
            .unwrap()
            .iter()
            .map(Question::id)
            .collect();
        assert_eq!(ids, vec![QuestionId::new(1), QuestionId::new(2)]);

        assert!(repo.delete_question(QuestionId::new(1)).await.unwrap());
        assert!(!repo.delete_question(QuestionId::new(1)).await.unwrap());
    }
}

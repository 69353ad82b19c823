use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

use quiz_core::model::{
    BankChange, BankEvent, CorrectAnswer, OptionId, Question, QuestionId, QuestionOption,
    QuizMode, QuizSettings, UserId, UserProgress,
};
use quiz_core::time::fixed_clock;
use services::{ExamTick, QuizEngine, SessionError};
use storage::repository::{
    InMemoryRepository, ProgressRepository, QuestionCatalog, QuestionRecord, ResumeRepository,
    Storage, StorageError,
};

fn sample_bank() -> Vec<Question> {
    let records: Vec<QuestionRecord> =
        serde_json::from_str(include_str!("../../../data/sample_bank.json")).expect("sample bank");
    QuestionRecord::decode_all(records)
}

fn user() -> UserId {
    UserId::new(1)
}

fn q(id: u64) -> QuestionId {
    QuestionId::new(id)
}

async fn engine_with(storage: Storage) -> QuizEngine {
    let mut engine = QuizEngine::new(user(), QuizSettings::default(), fixed_clock(), storage)
        .with_rng(StdRng::seed_from_u64(11));
    engine.load().await;
    engine
}

async fn engine(repo: &InMemoryRepository) -> QuizEngine {
    engine_with(Storage::from_in_memory(repo.clone())).await
}

#[tokio::test]
async fn practice_then_mistake_review_clears_the_ledger() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    let view = engine.start(QuizMode::Practice).await.unwrap();
    assert_eq!(view.total, 7);

    let graded = engine.select_single(q(1), OptionId::B).await.unwrap().unwrap();
    assert!(graded.is_correct);
    assert!(!engine.progress().mistakes.contains(q(1)));
    assert!(engine.progress().answered.contains(q(1)));
    assert_eq!(engine.progress().answered.len(), 1);

    let graded = engine.select_single(q(2), OptionId::A).await.unwrap().unwrap();
    assert!(!graded.is_correct);
    assert_eq!(engine.progress().mistakes.iter().collect::<Vec<_>>(), vec![q(2)]);

    let view = engine.start(QuizMode::Mistakes).await.unwrap();
    assert_eq!(view.total, 1);
    assert_eq!(engine.session().unwrap().current_question().id(), q(2));

    engine.select_single(q(2), OptionId::D).await.unwrap();
    assert!(engine.progress().mistakes.is_empty());

    let result = engine.submit().await.unwrap();
    assert_eq!(result.score(), 100);

    let stored = repo.load_progress(user()).await.unwrap();
    assert_eq!(stored, engine.progress().clone());
    assert!(matches!(
        engine.start(QuizMode::Mistakes).await,
        Err(SessionError::NoMistakes)
    ));
}

#[tokio::test]
async fn unanswered_exam_expires_with_zero_score() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    let view = engine.start(QuizMode::Exam).await.unwrap();
    assert_eq!(view.total, 7);
    assert_eq!(view.remaining_seconds, Some(9_000));
    let session_id = view.session_id;

    for _ in 0..8_999 {
        assert!(matches!(
            engine.tick(session_id).await.unwrap(),
            Some(ExamTick::Running { .. })
        ));
    }
    let Some(ExamTick::Expired(result)) = engine.tick(session_id).await.unwrap() else {
        panic!("exam should expire on the last tick");
    };
    assert_eq!(result.score(), 0);
    assert_eq!(result.unanswered().len(), 7);
    assert!(engine.session().unwrap().is_submitted());
    assert_eq!(engine.tick(session_id).await.unwrap(), None);
}

struct FailingProgress;

#[async_trait]
impl ProgressRepository for FailingProgress {
    async fn save_progress(&self, _: UserId, _: &UserProgress) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn load_progress(&self, _: UserId) -> Result<UserProgress, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn progress_flush_failure_keeps_local_state() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let storage = Storage {
        questions: Arc::new(repo.clone()),
        progress: Arc::new(FailingProgress),
        resume: Arc::new(repo.clone()),
    };
    let mut engine = engine_with(storage).await;
    assert_eq!(engine.bank().count(), 7);

    engine.start(QuizMode::Practice).await.unwrap();
    let graded = engine.select_single(q(3), OptionId::B).await.unwrap();
    assert_eq!(graded.map(|g| g.is_correct), Some(false));
    assert!(engine.progress().mistakes.contains(q(3)));
    assert_eq!(engine.stats().total_answered, 1);

    // Storage failures never surface as session errors.
    let result = engine.submit().await.unwrap();
    assert_eq!(result.incorrect(), &[q(3)]);
    assert!(matches!(
        engine.start(QuizMode::Mistakes).await,
        Ok(view) if view.total == 1
    ));
}

#[tokio::test]
async fn practice_resumes_but_exam_starts_fresh() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    engine.start(QuizMode::Practice).await.unwrap();
    engine.select_single(q(1), OptionId::B).await.unwrap();
    engine.go_to(4).unwrap();
    engine.exit().await.unwrap();

    let saved = repo.load_resume(user(), QuizMode::Practice).await.unwrap().unwrap();
    assert_eq!(saved.current_index, 4);

    let view = engine.start(QuizMode::Practice).await.unwrap();
    assert_eq!(view.current_index, 4);
    assert_eq!(view.graded, 1);
    assert!(engine.session().unwrap().is_graded(q(1)));

    engine.start(QuizMode::Exam).await.unwrap();
    engine.next().unwrap();
    engine.exit().await;
    let view = engine.start(QuizMode::Exam).await.unwrap();
    assert_eq!(view.current_index, 0);
    assert_eq!(view.graded, 0);
    assert_eq!(repo.load_resume(user(), QuizMode::Exam).await.unwrap(), None);

    // Submitting practice discards the saved position.
    engine.start(QuizMode::Practice).await.unwrap();
    engine.submit().await.unwrap();
    assert_eq!(repo.load_resume(user(), QuizMode::Practice).await.unwrap(), None);
}

#[tokio::test]
async fn mistake_review_keeps_its_snapshot() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    engine.start(QuizMode::Practice).await.unwrap();
    engine.select_single(q(2), OptionId::A).await.unwrap();
    engine.select_single(q(5), OptionId::A).await.unwrap();

    let view = engine.start(QuizMode::Mistakes).await.unwrap();
    assert_eq!(view.total, 2);
    engine.select_single(q(2), OptionId::D).await.unwrap();
    assert_eq!(engine.progress().mistakes.len(), 1);

    let session = engine.session().unwrap();
    let ids: Vec<QuestionId> = session.questions().iter().map(Question::id).collect();
    assert_eq!(ids, vec![q(2), q(5)]);
    assert_eq!(engine.next().unwrap(), 1);
}

#[tokio::test]
async fn bank_changes_do_not_disturb_a_running_session() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    engine.start(QuizMode::Practice).await.unwrap();
    let change = engine.apply_bank_event(BankEvent::Deleted(q(3))).await;
    assert_eq!(change, BankChange::Removed(q(3)));
    assert_eq!(engine.bank().count(), 6);

    assert_eq!(engine.session().unwrap().total(), 7);
    let graded = engine.select_single(q(3), OptionId::A).await.unwrap();
    assert_eq!(graded.map(|g| g.is_correct), Some(true));

    let added = Question::with_inferred_kind(
        q(42),
        "Networks",
        "Which band does Zigbee commonly use?",
        vec![
            QuestionOption::new(OptionId::A, "2.4 GHz"),
            QuestionOption::new(OptionId::B, "60 GHz"),
        ],
        CorrectAnswer::parse("A").unwrap(),
        "",
    )
    .unwrap();
    let change = engine.apply_bank_event(BankEvent::Added(added)).await;
    assert_eq!(change, BankChange::Inserted(q(42)));
    assert_eq!(engine.bank().all().last().map(Question::id), Some(q(42)));
    assert_eq!(engine.session().unwrap().total(), 7);
}

#[tokio::test]
async fn replaced_bank_is_fetched_again() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    let remaining: Vec<Question> = sample_bank().into_iter().take(3).collect();
    repo.replace_all(&remaining).await.unwrap();
    assert_eq!(engine.bank().count(), 7);

    let change = engine.apply_bank_event(BankEvent::ReplacedAll).await;
    assert_eq!(change, BankChange::RefetchRequired);
    assert_eq!(engine.bank().count(), 3);
}

#[tokio::test]
async fn instant_answers_update_the_ledger() {
    let repo = InMemoryRepository::with_questions(sample_bank());
    let mut engine = engine(&repo).await;

    let view = engine.start(QuizMode::Instant).await.unwrap();
    assert_eq!(view.mode, QuizMode::Instant);
    assert_eq!(view.total, 1);

    let question = engine.instant().unwrap().question().clone();
    let wrong = question
        .options()
        .iter()
        .map(|o| o.id)
        .find(|id| !question.correct_answer().letters().contains(id))
        .unwrap();
    let graded = engine.select_single(question.id(), wrong).await.unwrap().unwrap();
    assert!(!graded.is_correct);
    assert!(engine.progress().mistakes.contains(question.id()));

    // A single-choice answer is locked after the first pick.
    assert_eq!(engine.select_single(question.id(), wrong).await.unwrap(), None);
    assert_eq!(engine.progress().answered.len(), 1);
    assert!(matches!(engine.submit().await, Err(SessionError::NotActive)));

    let view = engine.draw_again().unwrap();
    assert_eq!(view.graded, 0);
    assert_eq!(repo.load_resume(user(), QuizMode::Instant).await.unwrap(), None);
}

#[tokio::test]
async fn empty_bank_cannot_start() {
    let repo = InMemoryRepository::new();
    let mut engine = engine(&repo).await;
    for mode in [QuizMode::Practice, QuizMode::Exam, QuizMode::Instant] {
        assert!(matches!(engine.start(mode).await, Err(SessionError::EmptyBank)));
    }
    assert!(engine.session().is_none());
}

fn multiple_choice_bank() -> Vec<Question> {
    let question = |id: u64, correct: &str| {
        Question::with_inferred_kind(
            q(id),
            "Protocols",
            format!("Which of these apply to case {id}?"),
            vec![
                QuestionOption::new(OptionId::A, "MQTT"),
                QuestionOption::new(OptionId::B, "CoAP"),
                QuestionOption::new(OptionId::C, "AMQP"),
            ],
            CorrectAnswer::parse(correct).unwrap(),
            "",
        )
        .unwrap()
    };
    vec![question(1, "A"), question(2, "A,C"), question(3, "B,C")]
}

#[tokio::test]
async fn confirmed_multiple_choice_reaches_the_ledger() {
    let repo = InMemoryRepository::with_questions(multiple_choice_bank());
    let mut engine = engine(&repo).await;
    engine.start(QuizMode::Practice).await.unwrap();

    assert!(engine.toggle_multiple(q(3), OptionId::C).unwrap());
    assert!(engine.toggle_multiple(q(3), OptionId::B).unwrap());
    assert!(engine.progress().answered.is_empty());

    let graded = engine.confirm_multiple(q(3)).await.unwrap().unwrap();
    assert!(graded.is_correct);
    assert!(engine.progress().answered.contains(q(3)));
    assert!(!engine.progress().mistakes.contains(q(3)));

    assert!(engine.toggle_multiple(q(2), OptionId::B).unwrap());
    let graded = engine.confirm_multiple(q(2)).await.unwrap().unwrap();
    assert!(!graded.is_correct);
    assert!(engine.progress().mistakes.contains(q(2)));

    // Confirmed selections are frozen.
    assert!(!engine.toggle_multiple(q(2), OptionId::A).unwrap());
    assert_eq!(engine.confirm_multiple(q(2)).await.unwrap(), None);

    let stored = repo.load_progress(user()).await.unwrap();
    assert_eq!(stored, engine.progress().clone());
}

#[tokio::test]
async fn pending_multiple_choice_is_graded_on_submit() {
    let repo = InMemoryRepository::with_questions(multiple_choice_bank());
    let mut engine = engine(&repo).await;
    engine.start(QuizMode::Exam).await.unwrap();

    engine.toggle_multiple(q(2), OptionId::A).unwrap();
    engine.toggle_multiple(q(3), OptionId::B).unwrap();
    engine.toggle_multiple(q(3), OptionId::C).unwrap();
    assert!(engine.progress().answered.is_empty());

    let result = engine.submit().await.unwrap();
    assert_eq!(result.correct(), 1);
    assert_eq!(result.incorrect(), &[q(2)]);
    assert_eq!(result.unanswered(), &[q(1)]);

    let progress = engine.progress();
    assert_eq!(progress.answered.iter().collect::<Vec<_>>(), vec![q(2), q(3)]);
    assert_eq!(progress.mistakes.iter().collect::<Vec<_>>(), vec![q(2)]);
    let stored = repo.load_progress(user()).await.unwrap();
    assert_eq!(&stored, progress);

    let view = engine.start(QuizMode::Mistakes).await.unwrap();
    assert_eq!(view.total, 1);
}

use rand::SeedableRng;
use rand::rngs::StdRng;

use quiz_core::model::{
    BankChange, BankEvent, OptionId, QuestionBank, QuestionId, QuizMode, QuizResult,
    QuizSettings, SessionId, UserId, UserProgress,
};
use quiz_core::stats::UserStats;
use quiz_core::time::TickOutcome;
use quiz_core::{Clock, Grading};
use storage::repository::Storage;

use super::instant::InstantDraw;
use super::plan::{draw_random, sample_exam};
use super::progress::SessionProgress;
use super::service::QuizSession;
use crate::error::SessionError;

/// What the user is currently doing.
#[derive(Debug, Clone, Default)]
pub enum Activity {
    #[default]
    Idle,
    Session(QuizSession),
    Instant(InstantDraw),
}

/// Effect of one exam countdown tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamTick {
    Running { remaining: u32 },
    /// Time ran out and the exam was submitted.
    Expired(QuizResult),
}

/// Owns the bank snapshot, the user's progress and the active quiz.
///
/// Every mutation goes through `&mut self`, so a single owner (see
/// [`crate::actor::QuizActor`]) serialises all changes. Persistence failures are
/// logged and never roll back local state.
pub struct QuizEngine {
    user: UserId,
    settings: QuizSettings,
    clock: Clock,
    storage: Storage,
    rng: StdRng,
    bank: QuestionBank,
    progress: UserProgress,
    activity: Activity,
    resume_dirty: bool,
}

impl QuizEngine {
    #[must_use]
    pub fn new(user: UserId, settings: QuizSettings, clock: Clock, storage: Storage) -> Self {
        Self {
            user,
            settings,
            clock,
            storage,
            rng: StdRng::from_os_rng(),
            bank: QuestionBank::default(),
            progress: UserProgress::default(),
            activity: Activity::Idle,
            resume_dirty: false,
        }
    }

    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        match &self.activity {
            Activity::Session(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn instant(&self) -> Option<&InstantDraw> {
        match &self.activity {
            Activity::Instant(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn view(&self) -> Option<SessionProgress> {
        match &self.activity {
            Activity::Idle => None,
            Activity::Session(s) => Some(s.progress()),
            Activity::Instant(d) => Some(d.progress()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> UserStats {
        UserStats::compute(&self.bank, &self.progress)
    }

    /// The exam whose countdown should be running, if any.
    #[must_use]
    pub fn running_exam(&self) -> Option<SessionId> {
        self.session()
            .filter(|s| s.mode() == QuizMode::Exam && !s.is_submitted())
            .map(QuizSession::id)
    }

    /// True when a practice session has unsaved position or answers.
    #[must_use]
    pub fn resume_dirty(&self) -> bool {
        self.resume_dirty
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    /// Fetch the bank and the user's progress. Failures leave the current
    /// state in place.
    pub async fn load(&mut self) {
        self.refresh_bank().await;
        match self.storage.progress.load_progress(self.user).await {
            Ok(progress) => {
                tracing::info!(
                    user.id = %self.user,
                    answered = progress.answered.len(),
                    wrong = progress.mistakes.len(),
                    "progress loaded"
                );
                self.progress = progress;
            }
            Err(e) => {
                tracing::warn!(user.id = %self.user, error = %e, "failed to load progress");
            }
        }
    }

    /// Re-fetch the whole bank. Running sessions keep their own snapshot.
    pub async fn refresh_bank(&mut self) -> usize {
        match self.storage.questions.fetch_all().await {
            Ok(questions) => {
                self.bank.replace_all(questions);
                tracing::info!(questions = self.bank.count(), "question bank loaded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch question bank; keeping previous snapshot");
            }
        }
        self.bank.count()
    }

    /// Apply a pushed bank change. A whole-bank replacement triggers a re-fetch.
    pub async fn apply_bank_event(&mut self, event: BankEvent) -> BankChange {
        let change = self.bank.apply(event);
        tracing::debug!(?change, "bank event applied");
        if change == BankChange::RefetchRequired {
            self.refresh_bank().await;
        }
        change
    }

    //
    // ─── MODES ─────────────────────────────────────────────────────────────────
    //

    /// Leave whatever is active and start `mode`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` when there is nothing to ask and
    /// `SessionError::NoMistakes` when a mistake review has nothing to review.
    pub async fn start(&mut self, mode: QuizMode) -> Result<SessionProgress, SessionError> {
        self.exit().await;
        let now = self.clock.now();

        let session = match mode {
            QuizMode::Practice => {
                let fresh = QuizSession::new(mode, self.bank.all().to_vec(), now)?;
                match self.storage.resume.load_resume(self.user, mode).await {
                    Ok(Some(fragment)) => fresh.resumed(fragment),
                    Ok(None) => fresh,
                    Err(e) => {
                        tracing::warn!(user.id = %self.user, error = %e, "failed to load saved practice");
                        fresh
                    }
                }
            }
            QuizMode::Exam => {
                if let Err(e) = self.storage.resume.clear_resume(self.user, mode).await {
                    tracing::warn!(user.id = %self.user, error = %e, "failed to discard previous exam");
                }
                let questions = sample_exam(&self.bank, self.settings.exam_size(), &mut self.rng);
                QuizSession::new(mode, questions, now)?
                    .with_countdown(self.settings.exam_duration_secs())
            }
            QuizMode::Mistakes => {
                let mistakes = &self.progress.mistakes;
                let questions = self.bank.filter(|q| mistakes.contains(q.id()));
                if questions.is_empty() {
                    return Err(SessionError::NoMistakes);
                }
                QuizSession::new(mode, questions, now)?
            }
            QuizMode::Instant => return self.draw_instant(),
        };

        tracing::info!(
            user.id = %self.user,
            %mode,
            session.id = %session.id(),
            questions = session.total(),
            resumed_at = session.current_index(),
            "quiz started"
        );
        let view = session.progress();
        self.activity = Activity::Session(session);
        Ok(view)
    }

    /// Replace the instant question with a fresh draw.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside instant mode.
    pub fn draw_again(&mut self) -> Result<SessionProgress, SessionError> {
        if self.instant().is_none() {
            return Err(SessionError::NotActive);
        }
        self.draw_instant()
    }

    fn draw_instant(&mut self) -> Result<SessionProgress, SessionError> {
        let question = draw_random(&self.bank, &mut self.rng).ok_or(SessionError::EmptyBank)?;
        tracing::debug!(question.id = %question.id(), "instant question drawn");
        let draw = InstantDraw::new(question);
        let view = draw.progress();
        self.activity = Activity::Instant(draw);
        Ok(view)
    }

    /// Leave the active quiz. An unsubmitted practice session is saved for
    /// later; an exam or mistake review is discarded.
    pub async fn exit(&mut self) -> Option<SessionId> {
        self.resume_dirty = false;
        match std::mem::take(&mut self.activity) {
            Activity::Idle => None,
            Activity::Instant(draw) => Some(draw.id()),
            Activity::Session(session) => {
                if session.mode().is_resumable() && !session.is_submitted() {
                    self.save_resume(&session).await;
                }
                tracing::info!(session.id = %session.id(), mode = %session.mode(), "quiz exited");
                Some(session.id())
            }
        }
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when idle, otherwise any error of the
    /// active session or draw.
    pub async fn select_single(
        &mut self,
        id: QuestionId,
        option: OptionId,
    ) -> Result<Option<Grading>, SessionError> {
        let grading = match &mut self.activity {
            Activity::Session(s) => s.select_single(id, option)?,
            Activity::Instant(d) if d.question().id() == id => d.select_single(option)?,
            Activity::Instant(_) => return Err(SessionError::UnknownQuestion(id)),
            Activity::Idle => return Err(SessionError::NotActive),
        };
        self.touch_resume();
        if let Some(grading) = grading {
            self.record(&[grading]).await;
        }
        Ok(grading)
    }

    /// # Errors
    ///
    /// Same conditions as [`QuizEngine::select_single`].
    pub fn toggle_multiple(&mut self, id: QuestionId, option: OptionId) -> Result<bool, SessionError> {
        let changed = match &mut self.activity {
            Activity::Session(s) => s.toggle_multiple(id, option)?,
            Activity::Instant(d) if d.question().id() == id => d.toggle_multiple(option)?,
            Activity::Instant(_) => return Err(SessionError::UnknownQuestion(id)),
            Activity::Idle => return Err(SessionError::NotActive),
        };
        if changed {
            self.touch_resume();
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// Same conditions as [`QuizEngine::select_single`].
    pub async fn confirm_multiple(&mut self, id: QuestionId) -> Result<Option<Grading>, SessionError> {
        let grading = match &mut self.activity {
            Activity::Session(s) => s.confirm_multiple(id)?,
            Activity::Instant(d) if d.question().id() == id => d.confirm_multiple()?,
            Activity::Instant(_) => return Err(SessionError::UnknownQuestion(id)),
            Activity::Idle => return Err(SessionError::NotActive),
        };
        self.touch_resume();
        if let Some(grading) = grading {
            self.record(&[grading]).await;
        }
        Ok(grading)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    fn navigate(&mut self, step: impl FnOnce(&mut QuizSession) -> usize) -> Result<usize, SessionError> {
        let Activity::Session(session) = &mut self.activity else {
            return Err(SessionError::NotActive);
        };
        let before = session.current_index();
        let index = step(session);
        if index != before {
            self.touch_resume();
        }
        Ok(index)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` without a multi-question session.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.navigate(QuizSession::next)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` without a multi-question session.
    pub fn prev(&mut self) -> Result<usize, SessionError> {
        self.navigate(QuizSession::prev)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` without a multi-question session.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.navigate(|s| s.go_to(index))
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Submit the active session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` without a multi-question session and
    /// `SessionError::Submitted` if it was already submitted.
    pub async fn submit(&mut self) -> Result<QuizResult, SessionError> {
        let now = self.clock.now();
        let Activity::Session(session) = &mut self.activity else {
            return Err(SessionError::NotActive);
        };
        let submission = session.submit(now)?;
        let (id, mode) = (session.id(), session.mode());
        self.resume_dirty = false;

        if !submission.auto_graded.is_empty() {
            self.record(&submission.auto_graded).await;
        }
        if mode.is_resumable()
            && let Err(e) = self.storage.resume.clear_resume(self.user, mode).await
        {
            tracing::warn!(user.id = %self.user, error = %e, "failed to clear saved practice");
        }

        tracing::info!(
            session.id = %id,
            %mode,
            score = submission.result.score(),
            correct = submission.result.correct(),
            total = submission.result.total(),
            "quiz submitted"
        );
        Ok(submission.result)
    }

    /// Advance the countdown of exam `session_id`; ticks for any other
    /// session are ignored.
    ///
    /// # Errors
    ///
    /// Propagates submission errors when the countdown expires.
    pub async fn tick(&mut self, session_id: SessionId) -> Result<Option<ExamTick>, SessionError> {
        let outcome = match &mut self.activity {
            Activity::Session(s) if s.id() == session_id => s.tick(),
            _ => None,
        };
        match outcome {
            None => {
                tracing::trace!(session.id = %session_id, "ignoring stale tick");
                Ok(None)
            }
            Some(TickOutcome::Running { remaining }) => Ok(Some(ExamTick::Running { remaining })),
            Some(TickOutcome::Expired) => {
                tracing::info!(session.id = %session_id, "exam time expired");
                let result = self.submit().await?;
                Ok(Some(ExamTick::Expired(result)))
            }
        }
    }

    //
    // ─── PERSISTENCE ───────────────────────────────────────────────────────────
    //

    /// Save the practice position if it changed since the last save.
    /// Returns whether a save succeeded.
    pub async fn flush_resume(&mut self) -> bool {
        if !std::mem::take(&mut self.resume_dirty) {
            return false;
        }
        match &self.activity {
            Activity::Session(s) if s.mode().is_resumable() && !s.is_submitted() => {
                self.save_resume(s).await
            }
            _ => false,
        }
    }

    fn touch_resume(&mut self) {
        if let Activity::Session(s) = &self.activity
            && s.mode().is_resumable()
            && !s.is_submitted()
        {
            self.resume_dirty = true;
        }
    }

    async fn save_resume(&self, session: &QuizSession) -> bool {
        match self
            .storage
            .resume
            .save_resume(self.user, session.mode(), &session.resume_fragment())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user.id = %self.user, error = %e, "failed to save practice position");
                false
            }
        }
    }

    async fn record(&mut self, gradings: &[Grading]) {
        for grading in gradings {
            tracing::debug!(
                question.id = %grading.question_id,
                correct = grading.is_correct,
                "answer graded"
            );
            self.progress.record(*grading);
        }
        if let Err(e) = self
            .storage
            .progress
            .save_progress(self.user, &self.progress)
            .await
        {
            tracing::warn!(user.id = %self.user, error = %e, "progress flush failed; keeping local state");
        }
    }
}

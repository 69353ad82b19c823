//! Single-owner task around [`QuizEngine`].
//!
//! UI input, pushed bank changes, exam ticks and debounced resume saves all
//! arrive as [`Command`]s on one queue and are applied one at a time. Results
//! go back on per-command oneshot channels; notifications go out as
//! [`QuizEvent`]s.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use quiz_core::Grading;
use quiz_core::model::{
    AnswerEntry, BankChange, BankEvent, OptionId, Question, QuestionId, QuizMode, QuizResult,
    SessionId,
};
use quiz_core::stats::UserStats;

use crate::error::SessionError;
use crate::sessions::{ExamTick, QuizEngine, SessionProgress};

const COMMAND_BUFFER: usize = 64;

/// Notifications emitted by the actor.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    Started(SessionProgress),
    /// A mistake review was requested with an empty ledger.
    NoMistakes,
    Graded(Grading),
    Tick {
        session_id: SessionId,
        remaining: u32,
    },
    Submitted {
        session_id: SessionId,
        result: QuizResult,
    },
    Exited(SessionId),
    BankUpdated(BankChange),
}

/// Everything a screen needs to render the current state.
#[derive(Debug, Clone)]
pub struct QuizSnapshot {
    pub view: Option<SessionProgress>,
    pub question: Option<Question>,
    pub entry: Option<AnswerEntry>,
    pub result: Option<QuizResult>,
    pub stats: UserStats,
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Reload(oneshot::Sender<usize>),
    Start { mode: QuizMode, reply: Reply<SessionProgress> },
    DrawAgain(Reply<SessionProgress>),
    SelectSingle { question: QuestionId, option: OptionId, reply: Reply<Option<Grading>> },
    ToggleMultiple { question: QuestionId, option: OptionId, reply: Reply<bool> },
    ConfirmMultiple { question: QuestionId, reply: Reply<Option<Grading>> },
    Next(Reply<usize>),
    Prev(Reply<usize>),
    GoTo { index: usize, reply: Reply<usize> },
    Submit(Reply<QuizResult>),
    Exit(oneshot::Sender<Option<SessionId>>),
    Snapshot(oneshot::Sender<QuizSnapshot>),
    Bank { event: BankEvent, reply: oneshot::Sender<BankChange> },
    Tick(SessionId),
    FlushResume { generation: u64 },
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front door to a running [`QuizActor`].
#[derive(Clone)]
pub struct QuizHandle {
    tx: mpsc::Sender<Command>,
}

impl QuizHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SessionError::ActorClosed)?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Re-fetch bank and progress. Returns the bank size.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ActorClosed` if the actor has stopped.
    pub async fn reload(&self) -> Result<usize, SessionError> {
        self.request(Command::Reload).await
    }

    /// # Errors
    ///
    /// See [`QuizEngine::start`].
    pub async fn start(&self, mode: QuizMode) -> Result<SessionProgress, SessionError> {
        self.request(|reply| Command::Start { mode, reply }).await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::draw_again`].
    pub async fn draw_again(&self) -> Result<SessionProgress, SessionError> {
        self.request(Command::DrawAgain).await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::select_single`].
    pub async fn select_single(
        &self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<Option<Grading>, SessionError> {
        self.request(|reply| Command::SelectSingle {
            question,
            option,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::toggle_multiple`].
    pub async fn toggle_multiple(
        &self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<bool, SessionError> {
        self.request(|reply| Command::ToggleMultiple {
            question,
            option,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::confirm_multiple`].
    pub async fn confirm_multiple(
        &self,
        question: QuestionId,
    ) -> Result<Option<Grading>, SessionError> {
        self.request(|reply| Command::ConfirmMultiple { question, reply })
            .await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::next`].
    pub async fn next(&self) -> Result<usize, SessionError> {
        self.request(Command::Next).await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::prev`].
    pub async fn prev(&self) -> Result<usize, SessionError> {
        self.request(Command::Prev).await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::go_to`].
    pub async fn go_to(&self, index: usize) -> Result<usize, SessionError> {
        self.request(|reply| Command::GoTo { index, reply }).await?
    }

    /// # Errors
    ///
    /// See [`QuizEngine::submit`].
    pub async fn submit(&self) -> Result<QuizResult, SessionError> {
        self.request(Command::Submit).await?
    }

    /// # Errors
    ///
    /// Returns `SessionError::ActorClosed` if the actor has stopped.
    pub async fn exit(&self) -> Result<Option<SessionId>, SessionError> {
        self.request(Command::Exit).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::ActorClosed` if the actor has stopped.
    pub async fn snapshot(&self) -> Result<QuizSnapshot, SessionError> {
        self.request(Command::Snapshot).await
    }

    /// Forward a pushed bank change.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ActorClosed` if the actor has stopped.
    pub async fn bank_event(&self, event: BankEvent) -> Result<BankChange, SessionError> {
        self.request(|reply| Command::Bank { event, reply }).await
    }

    /// Save any open practice session and stop the actor.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ActorClosed` if the actor had already stopped.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(Command::Shutdown).await
    }
}

/// Owns the engine and the only exam timer and pending resume save.
pub struct QuizActor {
    engine: QuizEngine,
    commands: mpsc::Receiver<Command>,
    loopback: mpsc::WeakSender<Command>,
    events: mpsc::UnboundedSender<QuizEvent>,
    timer: Option<JoinHandle<()>>,
    debounce: Option<JoinHandle<()>>,
    generation: u64,
}

impl QuizActor {
    /// Spawn the actor on the current tokio runtime.
    ///
    /// The actor stops when every handle is dropped or on
    /// [`QuizHandle::shutdown`].
    #[must_use]
    pub fn spawn(
        engine: QuizEngine,
    ) -> (QuizHandle, mpsc::UnboundedReceiver<QuizEvent>, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events, events_rx) = mpsc::unbounded_channel();
        let actor = Self {
            engine,
            commands,
            loopback: tx.downgrade(),
            events,
            timer: None,
            debounce: None,
            generation: 0,
        };
        let task = tokio::spawn(actor.run());
        (QuizHandle { tx }, events_rx, task)
    }

    async fn run(mut self) {
        let mut shutdown_ack = None;
        while let Some(command) = self.commands.recv().await {
            if let Command::Shutdown(ack) = command {
                shutdown_ack = Some(ack);
                break;
            }
            self.handle(command).await;
        }

        self.cancel_background();
        if let Some(id) = self.engine.exit().await {
            self.emit(QuizEvent::Exited(id));
        }
        tracing::debug!("quiz actor stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    fn emit(&self, event: QuizEvent) {
        let _ = self.events.send(event);
    }

    #[allow(clippy::too_many_lines)]
    async fn handle(&mut self, command: Command) {
        match command {
            Command::Reload(reply) => {
                self.engine.load().await;
                let _ = reply.send(self.engine.bank().count());
            }
            Command::Start { mode, reply } => {
                self.cancel_background();
                let started = self.engine.start(mode).await;
                match &started {
                    Ok(view) => {
                        if self.engine.running_exam() == Some(view.session_id) {
                            self.start_timer(view.session_id);
                        }
                        self.emit(QuizEvent::Started(view.clone()));
                    }
                    Err(SessionError::NoMistakes) => self.emit(QuizEvent::NoMistakes),
                    Err(e) => tracing::debug!(%mode, error = %e, "quiz not started"),
                }
                let _ = reply.send(started);
            }
            Command::DrawAgain(reply) => {
                let drawn = self.engine.draw_again();
                if let Ok(view) = &drawn {
                    self.emit(QuizEvent::Started(view.clone()));
                }
                let _ = reply.send(drawn);
            }
            Command::SelectSingle {
                question,
                option,
                reply,
            } => {
                let graded = self.engine.select_single(question, option).await;
                self.after_answer(graded.as_ref().ok().copied().flatten());
                let _ = reply.send(graded);
            }
            Command::ToggleMultiple {
                question,
                option,
                reply,
            } => {
                let toggled = self.engine.toggle_multiple(question, option);
                self.after_answer(None);
                let _ = reply.send(toggled);
            }
            Command::ConfirmMultiple { question, reply } => {
                let graded = self.engine.confirm_multiple(question).await;
                self.after_answer(graded.as_ref().ok().copied().flatten());
                let _ = reply.send(graded);
            }
            Command::Next(reply) => {
                let moved = self.engine.next();
                self.schedule_resume_save();
                let _ = reply.send(moved);
            }
            Command::Prev(reply) => {
                let moved = self.engine.prev();
                self.schedule_resume_save();
                let _ = reply.send(moved);
            }
            Command::GoTo { index, reply } => {
                let moved = self.engine.go_to(index);
                self.schedule_resume_save();
                let _ = reply.send(moved);
            }
            Command::Submit(reply) => {
                let session_id = self.engine.session().map(|s| s.id());
                let submitted = self.engine.submit().await;
                if let (Ok(result), Some(session_id)) = (&submitted, session_id) {
                    self.cancel_background();
                    self.emit(QuizEvent::Submitted {
                        session_id,
                        result: result.clone(),
                    });
                }
                let _ = reply.send(submitted);
            }
            Command::Exit(reply) => {
                self.cancel_background();
                let exited = self.engine.exit().await;
                if let Some(id) = exited {
                    self.emit(QuizEvent::Exited(id));
                }
                let _ = reply.send(exited);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Bank { event, reply } => {
                let change = self.engine.apply_bank_event(event).await;
                self.emit(QuizEvent::BankUpdated(change));
                let _ = reply.send(change);
            }
            Command::Tick(session_id) => self.on_tick(session_id).await,
            Command::FlushResume { generation } => {
                if generation == self.generation {
                    self.debounce = None;
                    self.engine.flush_resume().await;
                }
            }
            Command::Shutdown(_) => {}
        }
    }

    async fn on_tick(&mut self, session_id: SessionId) {
        match self.engine.tick(session_id).await {
            Ok(Some(ExamTick::Running { remaining })) => self.emit(QuizEvent::Tick {
                session_id,
                remaining,
            }),
            Ok(Some(ExamTick::Expired(result))) => {
                self.cancel_background();
                self.emit(QuizEvent::Submitted { session_id, result });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(session.id = %session_id, error = %e, "exam auto-submit failed");
            }
        }
    }

    fn after_answer(&mut self, grading: Option<Grading>) {
        if let Some(grading) = grading {
            self.emit(QuizEvent::Graded(grading));
        }
        self.schedule_resume_save();
    }

    fn snapshot(&self) -> QuizSnapshot {
        let (question, entry, result) = if let Some(session) = self.engine.session() {
            let question = session.current_question().clone();
            let entry = session.answers().entry(question.id()).clone();
            (Some(question), Some(entry), session.result().cloned())
        } else if let Some(draw) = self.engine.instant() {
            let question = draw.question().clone();
            let entry = draw.answers().entry(question.id()).clone();
            (Some(question), Some(entry), None)
        } else {
            (None, None, None)
        };
        QuizSnapshot {
            view: self.engine.view(),
            question,
            entry,
            result,
            stats: self.engine.stats(),
        }
    }

    //
    // ─── BACKGROUND TASKS ──────────────────────────────────────────────────────
    //

    fn start_timer(&mut self, session_id: SessionId) {
        self.stop_timer();
        let loopback = self.loopback.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = loopback.upgrade() else {
                    break;
                };
                if tx.send(Command::Tick(session_id)).await.is_err() {
                    break;
                }
            }
        }));
        tracing::debug!(session.id = %session_id, "exam timer started");
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Restart the save delay whenever the practice position changes.
    fn schedule_resume_save(&mut self) {
        if !self.engine.resume_dirty() {
            return;
        }
        self.cancel_debounce();
        self.generation += 1;
        let generation = self.generation;
        let delay = Duration::from_millis(self.engine.settings().resume_debounce_ms());
        let loopback = self.loopback.clone();
        self.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = loopback.upgrade() {
                let _ = tx.send(Command::FlushResume { generation }).await;
            }
        }));
    }

    fn cancel_debounce(&mut self) {
        if let Some(pending) = self.debounce.take() {
            pending.abort();
        }
        self.generation += 1;
    }

    fn cancel_background(&mut self) {
        self.stop_timer();
        self.cancel_debounce();
    }
}

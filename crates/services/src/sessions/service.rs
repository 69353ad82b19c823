use chrono::{DateTime, Utc};
use quiz_core::Grading;
use quiz_core::model::{
    AnswerSheet, OptionId, Question, QuestionId, QuizMode, QuizResult, ResumeFragment, SessionId,
};
use quiz_core::time::{Countdown, TickOutcome};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// Outcome of submitting a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub result: QuizResult,
    /// Multiple-choice selections confirmed on the user's behalf at submit.
    pub auto_graded: Vec<Grading>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One multi-question attempt: practice, exam or mistake review.
///
/// The question list is frozen when the session is created, so later bank
/// changes never reach an attempt in progress.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: SessionId,
    mode: QuizMode,
    questions: Vec<Question>,
    current: usize,
    answers: AnswerSheet,
    countdown: Option<Countdown>,
    started_at: DateTime<Utc>,
    result: Option<QuizResult>,
}

fn find(questions: &[Question], id: QuestionId) -> Result<&Question, SessionError> {
    questions
        .iter()
        .find(|q| q.id() == id)
        .ok_or(SessionError::UnknownQuestion(id))
}

impl QuizSession {
    /// Start an attempt over `questions`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` if no questions are given.
    pub fn new(
        mode: QuizMode,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyBank);
        }
        Ok(Self {
            id: SessionId::new(),
            mode,
            questions,
            current: 0,
            answers: AnswerSheet::new(),
            countdown: None,
            started_at,
            result: None,
        })
    }

    #[must_use]
    pub fn with_countdown(mut self, seconds: u32) -> Self {
        self.countdown = Some(Countdown::new(seconds));
        self
    }

    /// Restore a saved position and answers.
    ///
    /// Answers for questions outside this session are dropped and the index is
    /// clamped into range.
    #[must_use]
    pub fn resumed(mut self, fragment: ResumeFragment) -> Self {
        let ResumeFragment {
            current_index,
            mut answers,
        } = fragment;
        let questions = &self.questions;
        answers.retain(|id| questions.iter().any(|q| q.id() == id));
        self.answers = answers;
        self.current = current_index.min(self.last_index());
        self
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.countdown.map(|c| c.remaining())
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn is_graded(&self, id: QuestionId) -> bool {
        self.answers.is_graded(id)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            session_id: self.id,
            mode: self.mode,
            current_index: self.current,
            total: self.total(),
            graded: self
                .questions
                .iter()
                .filter(|q| self.answers.is_graded(q.id()))
                .count(),
            remaining_seconds: self.remaining_seconds(),
            is_submitted: self.is_submitted(),
        }
    }

    #[must_use]
    pub fn resume_fragment(&self) -> ResumeFragment {
        ResumeFragment {
            current_index: self.current,
            answers: self.answers.clone(),
        }
    }

    fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move forward one question, stopping at the last. Returns the new index.
    pub fn next(&mut self) -> usize {
        self.current = (self.current + 1).min(self.last_index());
        self.current
    }

    /// Move back one question, stopping at the first. Returns the new index.
    pub fn prev(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Jump to `index`, clamped into range.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.last_index());
        self.current
    }

    //
    // ─── ANSWERING ─────────────────────────────────────────────────────────────
    //

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_submitted() {
            Err(SessionError::Submitted)
        } else {
            Ok(())
        }
    }

    /// Record a single-choice answer. `Ok(None)` if the question was already answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submitted` after submission,
    /// `SessionError::UnknownQuestion` for ids outside the session, and
    /// `SessionError::Answer` for a bad option or question kind.
    pub fn select_single(
        &mut self,
        id: QuestionId,
        option: OptionId,
    ) -> Result<Option<Grading>, SessionError> {
        self.ensure_open()?;
        let question = find(&self.questions, id)?;
        Ok(self.answers.select_single(question, option)?)
    }

    /// # Errors
    ///
    /// Same conditions as [`QuizSession::select_single`].
    pub fn toggle_multiple(&mut self, id: QuestionId, option: OptionId) -> Result<bool, SessionError> {
        self.ensure_open()?;
        let question = find(&self.questions, id)?;
        Ok(self.answers.toggle_multiple(question, option)?)
    }

    /// Confirm and grade a multiple-choice answer. `Ok(None)` if already confirmed.
    ///
    /// # Errors
    ///
    /// Same conditions as [`QuizSession::select_single`], plus
    /// `AnswerError::NothingSelected` for an empty selection.
    pub fn confirm_multiple(&mut self, id: QuestionId) -> Result<Option<Grading>, SessionError> {
        self.ensure_open()?;
        let question = find(&self.questions, id)?;
        Ok(self.answers.confirm_multiple(question)?)
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Auto-confirm pending multiple-choice answers, then score the attempt.
    ///
    /// Unanswered questions never block submission; they count against the score.
    ///
    /// A `submitted_at` earlier than the start (a wall clock stepping
    /// backwards) is clamped to the start time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submitted` if already submitted. On any error
    /// the session is left untouched.
    pub fn submit(&mut self, submitted_at: DateTime<Utc>) -> Result<Submission, SessionError> {
        self.ensure_open()?;
        let mut answers = self.answers.clone();
        let auto_graded = answers.confirm_pending(&self.questions);
        let result = QuizResult::tally(
            self.mode,
            &self.questions,
            &answers,
            self.started_at,
            submitted_at.max(self.started_at),
        )?;
        self.answers = answers;
        self.result = Some(result.clone());
        self.countdown = None;
        Ok(Submission {
            result,
            auto_graded,
        })
    }

    /// Advance the exam countdown by one second.
    ///
    /// `None` when the session has no countdown or is already submitted.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        if self.is_submitted() {
            return None;
        }
        self.countdown.as_mut().map(Countdown::tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerError, CorrectAnswer, QuestionOption};
    use quiz_core::time::fixed_now;

    fn question(id: u64, correct: &str) -> Question {
        Question::with_inferred_kind(
            QuestionId::new(id),
            "General",
            format!("Q{id}"),
            vec![
                QuestionOption::new(OptionId::A, "a"),
                QuestionOption::new(OptionId::B, "b"),
                QuestionOption::new(OptionId::C, "c"),
            ],
            CorrectAnswer::parse(correct).unwrap(),
            "",
        )
        .unwrap()
    }

    fn session() -> QuizSession {
        QuizSession::new(
            QuizMode::Practice,
            vec![question(1, "A"), question(2, "A,C"), question(3, "B")],
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = QuizSession::new(QuizMode::Exam, Vec::new(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyBank));
    }

    #[test]
    fn navigation_clamps_without_wrapping() {
        let mut s = session();
        assert_eq!(s.prev(), 0);
        assert_eq!(s.next(), 1);
        assert_eq!(s.next(), 2);
        assert_eq!(s.next(), 2);
        assert_eq!(s.go_to(99), 2);
        assert_eq!(s.go_to(0), 0);
        assert_eq!(s.current_question().id(), QuestionId::new(1));
    }

    #[test]
    fn single_choice_is_write_once() {
        let mut s = session();
        let first = s.select_single(QuestionId::new(1), OptionId::A).unwrap();
        assert_eq!(
            first,
            Some(Grading {
                question_id: QuestionId::new(1),
                is_correct: true
            })
        );
        assert_eq!(s.select_single(QuestionId::new(1), OptionId::B).unwrap(), None);
        let submission = s.submit(fixed_now()).unwrap();
        assert_eq!(submission.result.correct(), 1);
    }

    #[test]
    fn multiple_choice_order_does_not_matter() {
        let mut s = session();
        let id = QuestionId::new(2);
        s.toggle_multiple(id, OptionId::C).unwrap();
        s.toggle_multiple(id, OptionId::A).unwrap();
        let grading = s.confirm_multiple(id).unwrap().unwrap();
        assert!(grading.is_correct);
        assert_eq!(s.confirm_multiple(id).unwrap(), None);
        assert!(!s.toggle_multiple(id, OptionId::B).unwrap());
    }

    #[test]
    fn rejects_wrong_operation_for_kind() {
        let mut s = session();
        let err = s.toggle_multiple(QuestionId::new(1), OptionId::A).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Answer(AnswerError::WrongKind { .. })
        ));
        let err = s.select_single(QuestionId::new(9), OptionId::A).unwrap_err();
        assert!(matches!(err, SessionError::UnknownQuestion(_)));
    }

    #[test]
    fn submit_auto_confirms_pending_selections() {
        let mut s = session();
        s.toggle_multiple(QuestionId::new(2), OptionId::A).unwrap();
        s.toggle_multiple(QuestionId::new(2), OptionId::C).unwrap();

        let submission = s.submit(fixed_now()).unwrap();

        assert_eq!(
            submission.auto_graded,
            vec![Grading {
                question_id: QuestionId::new(2),
                is_correct: true
            }]
        );
        assert_eq!(submission.result.correct(), 1);
        assert_eq!(submission.result.score(), 33);
        assert!(matches!(
            s.select_single(QuestionId::new(3), OptionId::B),
            Err(SessionError::Submitted)
        ));
        assert!(matches!(s.submit(fixed_now()), Err(SessionError::Submitted)));
    }

    #[test]
    fn submit_before_start_is_clamped_and_still_grades_pending() {
        let mut s = session();
        let id = QuestionId::new(2);
        s.toggle_multiple(id, OptionId::A).unwrap();

        let submission = s.submit(fixed_now() - chrono::Duration::seconds(1)).unwrap();

        assert_eq!(
            submission.auto_graded,
            vec![Grading {
                question_id: id,
                is_correct: false
            }]
        );
        assert_eq!(submission.result.incorrect(), &[id]);
        assert_eq!(submission.result.submitted_at(), fixed_now());
        assert!(s.is_submitted());
        assert!(s.is_graded(id));
    }

    #[test]
    fn resume_drops_unknown_answers_and_clamps_index() {
        let mut other = AnswerSheet::new();
        other.select_single(&question(1, "A"), OptionId::A).unwrap();
        other.select_single(&question(42, "A"), OptionId::B).unwrap();

        let s = session().resumed(ResumeFragment {
            current_index: 10,
            answers: other,
        });

        assert_eq!(s.current_index(), 2);
        assert_eq!(s.answers().len(), 1);
        assert!(s.is_graded(QuestionId::new(1)));
    }

    #[test]
    fn countdown_stops_after_submit() {
        let mut s = session().with_countdown(2);
        assert_eq!(s.tick(), Some(TickOutcome::Running { remaining: 1 }));
        assert_eq!(s.progress().remaining_seconds, Some(1));
        s.submit(fixed_now()).unwrap();
        assert_eq!(s.tick(), None);
        assert!(session().tick().is_none());
    }
}

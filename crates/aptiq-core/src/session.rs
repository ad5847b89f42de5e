//! The timed quiz state machine.
//!
//! A session walks `Loading → Presenting(0) → Answered(0) → Presenting(1)
//! → … → Completed`. It owns no timers: the per-question countdown moves
//! one second per [`QuizSession::tick`], and the reveal delay after an
//! answer ends when the driver calls [`QuizSession::advance`]. That keeps
//! every transition synchronous and testable without waiting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::QuizError;
use crate::model::{AnswerRecord, AnsweredSlot, Question, SessionRecord};
use crate::scoring;

/// Where a session is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the sampled question list.
    Loading,
    /// Question `i` is on screen and its clock is running.
    Presenting(usize),
    /// Question `i` was answered or timed out; its result is on screen.
    Answered(usize),
    Completed,
}

impl Phase {
    /// Index of the question on screen, if any.
    pub fn question_index(&self) -> Option<usize> {
        match *self {
            Phase::Presenting(i) | Phase::Answered(i) => Some(i),
            Phase::Loading | Phase::Completed => None,
        }
    }
}

/// Result of resolving one question, shown during the reveal delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub slot: AnsweredSlot,
    pub correct: bool,
    pub correct_answer_index: usize,
    pub delta: i64,
    /// Running raw score after this answer.
    pub score: i64,
    pub time_remaining_secs: u32,
    pub explanation: String,
}

/// Read-only view of a session for UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub total_questions: usize,
    pub remaining_secs: u32,
    pub score: i64,
    pub display_score: i64,
    pub last_feedback: Option<AnswerFeedback>,
}

impl SessionSnapshot {
    pub fn current_index(&self) -> Option<usize> {
        self.phase.question_index()
    }
}

/// One timed run through a list of questions.
pub struct QuizSession {
    id: Uuid,
    user_id: String,
    questions: Vec<Question>,
    answers: Vec<AnswerRecord>,
    score: i64,
    phase: Phase,
    remaining_secs: u32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    last_feedback: Option<AnswerFeedback>,
    clock: Arc<dyn Clock>,
}

impl QuizSession {
    /// Create a session in `Loading`.
    pub fn new(user_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            questions: Vec::new(),
            answers: Vec::new(),
            score: 0,
            phase: Phase::Loading,
            remaining_secs: 0,
            started_at,
            ended_at: None,
            last_feedback: None,
            clock,
        }
    }

    /// Create a session and load its questions in one step.
    pub fn start(
        user_id: impl Into<String>,
        questions: Vec<Question>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QuizError> {
        let mut session = Self::new(user_id, clock);
        session.load(questions)?;
        Ok(session)
    }

    /// Hand the sampled questions to a `Loading` session and present the
    /// first one. The list is copied into the session, so later changes to
    /// the store cannot alter this run.
    pub fn load(&mut self, questions: Vec<Question>) -> Result<(), QuizError> {
        if self.phase != Phase::Loading {
            tracing::debug!(session = %self.id, "questions already loaded, ignoring");
            return Ok(());
        }
        if questions.is_empty() {
            return Err(QuizError::EmptyQuestionList);
        }

        self.answers = vec![AnswerRecord::default(); questions.len()];
        self.remaining_secs = questions[0].time_limit_secs;
        self.questions = questions;
        self.phase = Phase::Presenting(0);
        tracing::debug!(
            session = %self.id,
            questions = self.questions.len(),
            "session started"
        );
        Ok(())
    }

    /// The user picked option `option` for the question on screen.
    ///
    /// Returns `None` when the selection is ignored: the question was
    /// already answered, the session is not presenting, or the option is
    /// out of range.
    pub fn select(&mut self, option: usize) -> Option<AnswerFeedback> {
        let Phase::Presenting(i) = self.phase else {
            tracing::debug!(session = %self.id, phase = ?self.phase, "selection ignored");
            return None;
        };
        if option >= self.questions[i].options.len() {
            tracing::debug!(session = %self.id, option, "option out of range");
            return None;
        }
        Some(self.resolve(i, AnsweredSlot::Selected(option)))
    }

    /// Advance the question clock by one second. Returns the timeout
    /// feedback when the clock hits zero.
    pub fn tick(&mut self) -> Option<AnswerFeedback> {
        let Phase::Presenting(i) = self.phase else {
            return None;
        };
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            Some(self.resolve(i, AnsweredSlot::TimedOut))
        } else {
            None
        }
    }

    /// End the reveal delay: present the next question or complete.
    pub fn advance(&mut self) -> Phase {
        if let Phase::Answered(i) = self.phase {
            let next = i + 1;
            if next < self.questions.len() {
                self.phase = Phase::Presenting(next);
                self.remaining_secs = self.questions[next].time_limit_secs;
            } else {
                self.phase = Phase::Completed;
                self.ended_at = Some(self.clock.now());
                tracing::debug!(session = %self.id, score = self.score, "session completed");
            }
        }
        self.phase
    }

    fn resolve(&mut self, index: usize, slot: AnsweredSlot) -> AnswerFeedback {
        let question = &self.questions[index];
        let delta = scoring::score_delta(question, &slot, self.remaining_secs);
        self.score += delta;
        self.answers[index] = AnswerRecord {
            slot,
            time_remaining_secs: self.remaining_secs,
            delta,
        };
        self.phase = Phase::Answered(index);

        let feedback = AnswerFeedback {
            question_index: index,
            slot,
            correct: matches!(slot, AnsweredSlot::Selected(k) if question.is_correct(k)),
            correct_answer_index: question.correct_answer_index,
            delta,
            score: self.score,
            time_remaining_secs: self.remaining_secs,
            explanation: question.explanation.clone(),
        };
        tracing::debug!(session = %self.id, index, ?slot, delta, "question resolved");
        self.last_feedback = Some(feedback.clone());
        feedback
    }

    /// Turn a completed session into its archive record. Returns `None`
    /// for a session that has not completed.
    pub fn finish(self) -> Option<SessionRecord> {
        if self.phase != Phase::Completed {
            tracing::debug!(session = %self.id, phase = ?self.phase, "unfinished session dropped");
            return None;
        }
        Some(SessionRecord {
            id: self.id,
            user_id: self.user_id,
            questions: self.questions,
            answers: self.answers,
            score: self.score,
            started_at: self.started_at,
            ended_at: self.ended_at,
            completed: true,
        })
    }

    /// Discard the session. Nothing is recorded anywhere.
    pub fn abandon(self) {
        tracing::debug!(
            session = %self.id,
            phase = ?self.phase,
            "session abandoned"
        );
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            total_questions: self.questions.len(),
            remaining_secs: self.remaining_secs,
            score: self.score,
            display_score: self.display_score(),
            last_feedback: self.last_feedback.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.phase.question_index().map(|i| &self.questions[i])
    }

    /// Raw cumulative score; may be negative.
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn display_score(&self) -> i64 {
        scoring::display_score(self.score)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::fixtures::question;
    use crate::model::{Category, Difficulty};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ))
    }

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| question(&format!("q{i}"), Category::Reasoning, Difficulty::Easy))
            .collect()
    }

    #[test]
    fn starts_loading_then_presents_first_question() {
        let mut session = QuizSession::new("ana", clock());
        assert_eq!(session.phase(), Phase::Loading);
        assert!(session.select(1).is_none());
        assert!(session.tick().is_none());

        session.load(questions(2)).unwrap();
        assert_eq!(session.phase(), Phase::Presenting(0));
        assert_eq!(session.remaining_secs(), 30);
        assert_eq!(session.current_question().unwrap().id, "q0");
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let result = QuizSession::start("ana", vec![], clock());
        assert!(matches!(result, Err(QuizError::EmptyQuestionList)));
    }

    #[test]
    fn correct_answer_scores_with_time_bonus() {
        let mut session = QuizSession::start("ana", questions(1), clock()).unwrap();
        for _ in 0..15 {
            assert!(session.tick().is_none());
        }
        let feedback = session.select(1).unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.delta, 115);
        assert_eq!(feedback.time_remaining_secs, 15);
        assert_eq!(session.phase(), Phase::Answered(0));
        assert_eq!(session.score(), 115);
    }

    #[test]
    fn second_selection_is_a_no_op() {
        let mut session = QuizSession::start("ana", questions(2), clock()).unwrap();
        session.select(0).unwrap();
        let score = session.score();

        assert!(session.select(1).is_none());
        assert_eq!(session.score(), score);
        assert_eq!(session.answers()[0].slot, AnsweredSlot::Selected(0));
    }

    #[test]
    fn out_of_range_option_does_not_consume_question() {
        let mut session = QuizSession::start("ana", questions(1), clock()).unwrap();
        assert!(session.select(9).is_none());
        assert_eq!(session.phase(), Phase::Presenting(0));
        assert!(session.select(1).is_some());
    }

    #[test]
    fn clock_stops_after_answer() {
        let mut session = QuizSession::start("ana", questions(2), clock()).unwrap();
        session.select(1).unwrap();
        for _ in 0..100 {
            assert!(session.tick().is_none());
        }
        assert_eq!(session.remaining_secs(), 30);
        assert_eq!(session.phase(), Phase::Answered(0));
    }

    #[test]
    fn timeout_records_sentinel_and_penalty() {
        let mut session = QuizSession::start("ana", questions(1), clock()).unwrap();
        let mut feedback = None;
        for _ in 0..30 {
            feedback = session.tick();
        }
        let feedback = feedback.expect("clock should expire on the 30th tick");
        assert_eq!(feedback.slot, AnsweredSlot::TimedOut);
        assert_eq!(feedback.delta, -20);
        assert!(!feedback.correct);
        assert_eq!(session.answers()[0].slot, AnsweredSlot::TimedOut);
        // A late selection after the timeout is ignored.
        assert!(session.select(1).is_none());
    }

    #[test]
    fn full_run_produces_record() {
        let clock = clock();
        let mut session = QuizSession::start("ana", questions(3), clock.clone()).unwrap();
        let started = session.snapshot();
        assert_eq!(started.total_questions, 3);

        session.select(1).unwrap(); // +130
        assert_eq!(session.advance(), Phase::Presenting(1));
        assert_eq!(session.remaining_secs(), 30);

        session.select(2).unwrap(); // -25
        assert_eq!(session.advance(), Phase::Presenting(2));

        while session.tick().is_none() {} // -20
        clock.advance(Duration::seconds(75));
        assert_eq!(session.advance(), Phase::Completed);
        // Completed is terminal.
        assert_eq!(session.advance(), Phase::Completed);

        let record = session.finish().unwrap();
        assert!(record.completed);
        assert_eq!(record.answers.len(), record.questions.len());
        assert_eq!(record.score, 85);
        assert_eq!(record.ended_at, Some(clock.now()));
        assert_eq!(
            record.answers.iter().map(|a| a.delta).sum::<i64>(),
            record.score
        );
    }

    #[test]
    fn negative_running_score_displays_as_zero() {
        let mut session = QuizSession::start("ana", questions(2), clock()).unwrap();
        session.select(0).unwrap();
        session.advance();
        session.select(3).unwrap();
        assert_eq!(session.score(), -50);
        assert_eq!(session.display_score(), 0);
        assert_eq!(session.snapshot().display_score, 0);
    }

    #[test]
    fn unfinished_session_yields_no_record() {
        let mut session = QuizSession::start("ana", questions(2), clock()).unwrap();
        session.select(1).unwrap();
        assert!(session.finish().is_none());
    }

    #[test]
    fn load_is_only_accepted_once() {
        let mut session = QuizSession::start("ana", questions(2), clock()).unwrap();
        session.load(questions(5)).unwrap();
        assert_eq!(session.questions().len(), 2);
    }
}

//! The engine facade used by front ends.
//!
//! [`QuizService`] is built once per process around a storage backend and
//! handed to whatever renders the quiz. Every method catches and logs
//! failures and returns emptier data instead, so nothing here can halt a
//! quiz.

use std::sync::Arc;
use std::time::Duration;

use crate::archive::{ArchivedSession, SessionArchive};
use crate::bank;
use crate::clock::{Clock, SystemClock};
use crate::driver::{spawn_session, DriverConfig, SessionHandle};
use crate::error::QuizError;
use crate::model::{Category, Difficulty, Question, SessionRecord};
use crate::sampler::{MixRatio, QuestionSampler};
use crate::session::QuizSession;
use crate::statistics::{QuestionStats, UserSummary};
use crate::storage::StorageBackend;
use crate::store::QuestionStore;

/// Tunables for a [`QuizService`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuizServiceConfig {
    pub tick: Duration,
    pub reveal_delay: Duration,
    pub mix: MixRatio,
    /// Fixed seed for every shuffle; `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
    /// Default number of sessions shown in history views.
    pub history_limit: usize,
}

impl Default for QuizServiceConfig {
    fn default() -> Self {
        let driver = DriverConfig::default();
        Self {
            tick: driver.tick,
            reveal_delay: driver.reveal_delay,
            mix: MixRatio::default(),
            rng_seed: None,
            history_limit: 10,
        }
    }
}

/// Question retrieval, session start-up, and history in one object.
pub struct QuizService {
    store: QuestionStore,
    archive: Arc<SessionArchive>,
    sampler: Arc<QuestionSampler>,
    clock: Arc<dyn Clock>,
    seed_questions: Option<Vec<Question>>,
    config: QuizServiceConfig,
}

impl QuizService {
    pub fn new(backend: Arc<dyn StorageBackend>, config: QuizServiceConfig) -> Self {
        let sampler = Arc::new(QuestionSampler::new(config.mix, config.rng_seed));
        Self {
            store: QuestionStore::new(backend.clone(), sampler.clone()),
            archive: Arc::new(SessionArchive::new(backend)),
            sampler,
            clock: Arc::new(SystemClock),
            seed_questions: None,
            config,
        }
    }

    /// Seed from `questions` instead of the bundled bank.
    pub fn with_seed_questions(mut self, questions: Vec<Question>) -> Self {
        self.seed_questions = Some(questions);
        self
    }

    /// Use `clock` for session timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &QuizServiceConfig {
        &self.config
    }

    /// Seed the question bank if it is empty, reporting failures.
    pub async fn try_seed_if_empty(&self) -> Result<usize, QuizError> {
        let corpus = match &self.seed_questions {
            Some(questions) => questions.clone(),
            None => bank::bundled_bank()?.questions,
        };
        self.store.seed_if_empty(&corpus).await
    }

    /// Seed the question bank if it is empty. Failures are logged and the
    /// next call tries again.
    pub async fn seed_if_empty(&self) -> usize {
        match self.try_seed_if_empty().await {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::error!("{e}");
                0
            }
        }
    }

    /// A difficulty-proportioned draw of up to `count` questions.
    pub async fn get_mixed_questions(&self, count: usize) -> Vec<Question> {
        let all = self.store.all().await;
        self.sampler.mixed_composition(all, count)
    }

    pub async fn get_questions_by_category(
        &self,
        category: Category,
        difficulty: Option<Difficulty>,
        count: usize,
    ) -> Vec<Question> {
        self.store.by_category(category, difficulty, count).await
    }

    /// Up to `count` random questions, optionally of one difficulty.
    pub async fn get_random_questions(
        &self,
        count: usize,
        difficulty: Option<Difficulty>,
    ) -> Vec<Question> {
        match difficulty {
            Some(difficulty) => self.store.by_difficulty(difficulty, count).await,
            None => {
                let all = self.store.all().await;
                self.sampler.random_subset(all, count)
            }
        }
    }

    pub async fn get_question_stats(&self) -> QuestionStats {
        self.store.stats().await
    }

    /// Start a timed session over `questions`. Must be called from within a
    /// tokio runtime; a completed session is archived automatically.
    pub fn start_session(
        &self,
        user_id: &str,
        questions: Vec<Question>,
    ) -> Result<SessionHandle, QuizError> {
        let session = QuizSession::start(user_id, questions, self.clock.clone())?;
        let driver = DriverConfig {
            tick: self.config.tick,
            reveal_delay: self.config.reveal_delay,
        };
        Ok(spawn_session(session, Some(self.archive.clone()), driver))
    }

    /// Archive a finished session. Returns the archive key, or `None` if
    /// the save failed (logged).
    pub async fn save_quiz_session(&self, session: &SessionRecord) -> Option<u64> {
        match self.archive.save(session).await {
            Ok(seq) => Some(seq),
            Err(e) => {
                tracing::error!(session = %session.id, "{e}");
                None
            }
        }
    }

    pub async fn get_user_quiz_history(&self, user_id: &str, limit: usize) -> Vec<ArchivedSession> {
        self.archive.history(user_id, limit).await
    }

    pub async fn get_user_summary(&self, user_id: &str) -> UserSummary {
        self.archive.summary(user_id).await
    }
}

//! Question bank breakdowns and session analytics.
//!
//! Everything here is derived on read from questions or archived session
//! records; nothing is stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnsweredSlot, Category, Difficulty, Question, SessionRecord};

/// Size of the question bank with per-category and per-difficulty counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
}

/// Count questions per category and per difficulty. Every known category
/// and difficulty appears, with zero if absent, and each question is
/// counted exactly once in each breakdown.
pub fn compute_question_stats(questions: &[Question]) -> QuestionStats {
    let mut by_category: BTreeMap<String, usize> = Category::ALL
        .iter()
        .map(|c| (c.to_string(), 0))
        .collect();
    let mut by_difficulty: BTreeMap<String, usize> = Difficulty::ALL
        .iter()
        .map(|d| (d.to_string(), 0))
        .collect();

    for q in questions {
        *by_category.entry(q.category.to_string()).or_default() += 1;
        *by_difficulty.entry(q.difficulty.to_string()).or_default() += 1;
    }

    QuestionStats {
        total: questions.len(),
        by_category,
        by_difficulty,
    }
}

/// Outcome counts for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicStats {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub timed_out: usize,
}

impl TopicStats {
    fn record(&mut self, question: &Question, slot: &AnsweredSlot) {
        self.total += 1;
        match *slot {
            AnsweredSlot::Selected(k) if question.is_correct(k) => self.correct += 1,
            AnsweredSlot::Selected(_) => self.incorrect += 1,
            AnsweredSlot::TimedOut => self.timed_out += 1,
            AnsweredSlot::Unanswered => {}
        }
    }

    fn merge(&mut self, other: &TopicStats) {
        self.total += other.total;
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.timed_out += other.timed_out;
    }

    /// correct / total, or 0 for an empty topic.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Derived statistics for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub overall: TopicStats,
    pub accuracy: f64,
    pub raw_score: i64,
    pub display_score: i64,
    /// Breakdown keyed by question category.
    pub by_category: BTreeMap<Category, TopicStats>,
}

/// Compute accuracy and the per-topic breakdown of a session.
pub fn compute_session_stats(record: &SessionRecord) -> SessionStats {
    let mut overall = TopicStats::default();
    let mut by_category: BTreeMap<Category, TopicStats> = BTreeMap::new();

    for (question, answer) in record.results() {
        overall.record(question, &answer.slot);
        by_category
            .entry(question.category)
            .or_default()
            .record(question, &answer.slot);
    }

    SessionStats {
        accuracy: overall.accuracy(),
        overall,
        raw_score: record.score,
        display_score: record.display_score(),
        by_category,
    }
}

/// Aggregate over all archived sessions of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    pub sessions: usize,
    pub overall: TopicStats,
    pub accuracy: f64,
    pub best_score: i64,
    pub average_score: f64,
    pub by_category: BTreeMap<Category, TopicStats>,
}

/// Summarize a user's archived sessions.
pub fn compute_user_summary(user_id: &str, records: &[SessionRecord]) -> UserSummary {
    let mut summary = UserSummary {
        user_id: user_id.to_string(),
        sessions: records.len(),
        ..Default::default()
    };
    if records.is_empty() {
        return summary;
    }

    let mut score_sum = 0i64;
    for record in records {
        let stats = compute_session_stats(record);
        summary.overall.merge(&stats.overall);
        for (category, topic) in &stats.by_category {
            summary.by_category.entry(*category).or_default().merge(topic);
        }
        summary.best_score = summary.best_score.max(stats.display_score);
        score_sum += stats.display_score;
    }

    summary.accuracy = summary.overall.accuracy();
    summary.average_score = score_sum as f64 / records.len() as f64;
    summary
}

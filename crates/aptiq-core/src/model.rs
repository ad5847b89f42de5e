//! Core data model types for aptiq.
//!
//! These are the fundamental types the whole engine shares: questions and
//! their classification enums, per-question answer slots, and the finished
//! session record that ends up in the archive.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single multiple-choice question from the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier for this question.
    pub id: String,
    /// Prompt shown to the user.
    pub text: String,
    /// What kind of thinking the question exercises.
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Topic the question belongs to.
    pub category: Category,
    /// Answer texts, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_answer_index: usize,
    /// Shown after the question is answered or times out.
    #[serde(default)]
    pub explanation: String,
    pub difficulty: Difficulty,
    /// Base score value.
    pub points: u32,
    /// Per-question countdown duration.
    pub time_limit_secs: u32,
    #[serde(default)]
    pub hints: Vec<String>,
    /// Free-form discovery tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Question {
    /// Check the record invariants: a non-empty option list, an in-range
    /// correct index, and positive points and time limit.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.options.is_empty() {
            return Err("options must not be empty".into());
        }
        if self.correct_answer_index >= self.options.len() {
            return Err(format!(
                "correct_answer_index {} out of range for {} options",
                self.correct_answer_index,
                self.options.len()
            ));
        }
        if self.points == 0 {
            return Err("points must be positive".into());
        }
        if self.time_limit_secs == 0 {
            return Err("time_limit_secs must be positive".into());
        }
        Ok(())
    }

    /// Returns `true` if `option` is the correct answer.
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer_index
    }

    /// Text of the correct option; empty if the index is out of range.
    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct_answer_index)
            .map_or("", String::as_str)
    }
}

/// The kind of reasoning a question exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Visual,
    Logical,
    Numerical,
    Verbal,
    Pattern,
    Spatial,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::Visual,
        QuestionType::Logical,
        QuestionType::Numerical,
        QuestionType::Verbal,
        QuestionType::Pattern,
        QuestionType::Spatial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Visual => "visual",
            QuestionType::Logical => "logical",
            QuestionType::Numerical => "numerical",
            QuestionType::Verbal => "verbal",
            QuestionType::Pattern => "pattern",
            QuestionType::Spatial => "spatial",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown question type: {s}"))
    }
}

/// Topic a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Reasoning,
    Quantitative,
    English,
    GeneralKnowledge,
    DataInterpretation,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Reasoning,
        Category::Quantitative,
        Category::English,
        Category::GeneralKnowledge,
        Category::DataInterpretation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Reasoning => "reasoning",
            Category::Quantitative => "quantitative",
            Category::English => "english",
            Category::GeneralKnowledge => "general_knowledge",
            Category::DataInterpretation => "data_interpretation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "reasoning" => Ok(Category::Reasoning),
            "quantitative" | "quant" => Ok(Category::Quantitative),
            "english" => Ok(Category::English),
            "general_knowledge" | "gk" => Ok(Category::GeneralKnowledge),
            "data_interpretation" | "di" => Ok(Category::DataInterpretation),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Base points used when a bank entry does not set `points`.
    pub fn default_points(&self) -> u32 {
        match self {
            Difficulty::Easy => 100,
            Difficulty::Medium => 150,
            Difficulty::Hard => 200,
        }
    }

    /// Countdown used when a bank entry does not set `time_limit_secs`.
    pub fn default_time_limit_secs(&self) -> u32 {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Medium => 45,
            Difficulty::Hard => 60,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// What happened to one question of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "option", rename_all = "snake_case")]
pub enum AnsweredSlot {
    #[default]
    Unanswered,
    Selected(usize),
    /// The clock ran out before an option was chosen.
    TimedOut,
}

impl AnsweredSlot {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, AnsweredSlot::Unanswered)
    }
}

/// An answer slot plus the clock reading and score delta it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub slot: AnsweredSlot,
    /// Seconds left on the question clock when the slot was resolved.
    #[serde(default)]
    pub time_remaining_secs: u32,
    /// Points added to (or removed from) the running score.
    #[serde(default)]
    pub delta: i64,
}

/// A finished quiz run, as handed to the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Questions as they were when the session started.
    pub questions: Vec<Question>,
    /// One entry per question, same order.
    pub answers: Vec<AnswerRecord>,
    /// Raw cumulative score. May be negative.
    pub score: i64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl SessionRecord {
    /// Score as shown to the user, never below zero.
    pub fn display_score(&self) -> i64 {
        crate::scoring::display_score(self.score)
    }

    /// Iterate questions together with their answer records.
    pub fn results(&self) -> impl Iterator<Item = (&Question, &AnswerRecord)> {
        self.questions.iter().zip(self.answers.iter())
    }

    pub fn correct_count(&self) -> usize {
        self.results()
            .filter(|(q, a)| matches!(a.slot, AnsweredSlot::Selected(k) if q.is_correct(k)))
            .count()
    }

    /// Fraction of questions answered correctly, in `[0, 1]`.
    pub fn accuracy(&self) -> f64 {
        if self.questions.is_empty() {
            0.0
        } else {
            self.correct_count() as f64 / self.questions.len() as f64
        }
    }
}

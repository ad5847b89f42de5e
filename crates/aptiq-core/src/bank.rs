//! TOML question bank parser.
//!
//! Loads question banks from TOML files and directories, enforces the
//! per-question invariants, and reports softer issues as warnings. The
//! bundled bank ships inside the crate and seeds an empty store.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BankError;
use crate::model::{Category, Difficulty, Question, QuestionType};

const BUNDLED_BANK: &str = include_str!("../data/question-bank.toml");
const BUNDLED_BANK_PATH: &str = "<bundled>/question-bank.toml";

/// A parsed question bank.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    pub description: String,
    pub questions: Vec<Question>,
}

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    text: String,
    #[serde(rename = "type")]
    kind: String,
    category: String,
    options: Vec<String>,
    correct_answer_index: usize,
    #[serde(default)]
    explanation: String,
    difficulty: String,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    time_limit_secs: Option<u32>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl TomlQuestion {
    fn into_question(self) -> Result<Question, BankError> {
        let invalid = |reason: String| BankError::InvalidQuestion {
            id: self.id.clone(),
            reason,
        };
        let kind: QuestionType = self.kind.parse().map_err(invalid)?;
        let category: Category = self.category.parse().map_err(invalid)?;
        let difficulty: Difficulty = self.difficulty.parse().map_err(invalid)?;

        let question = Question {
            points: self.points.unwrap_or_else(|| difficulty.default_points()),
            time_limit_secs: self
                .time_limit_secs
                .unwrap_or_else(|| difficulty.default_time_limit_secs()),
            id: self.id,
            text: self.text,
            kind,
            category,
            options: self.options,
            correct_answer_index: self.correct_answer_index,
            explanation: self.explanation,
            difficulty,
            hints: self.hints,
            tags: self.tags,
        };

        question
            .check_invariants()
            .map_err(|reason| BankError::InvalidQuestion {
                id: question.id.clone(),
                reason,
            })?;
        Ok(question)
    }
}

/// The bank compiled into this crate.
pub fn bundled_bank() -> Result<QuestionBank, BankError> {
    parse_question_bank_str(BUNDLED_BANK, Path::new(BUNDLED_BANK_PATH))
}

/// Parse a single TOML file into a [`QuestionBank`].
pub fn parse_question_bank(path: &Path) -> Result<QuestionBank, BankError> {
    let content = std::fs::read_to_string(path).map_err(|source| BankError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_question_bank_str(&content, path)
}

/// Parse a TOML string into a [`QuestionBank`] (useful for testing).
pub fn parse_question_bank_str(
    content: &str,
    source_path: &Path,
) -> Result<QuestionBank, BankError> {
    let parsed: TomlBankFile = toml::from_str(content).map_err(|e| BankError::Parse {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })?;

    let questions = parsed
        .questions
        .into_iter()
        .map(TomlQuestion::into_question)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        questions,
    })
}

/// Recursively load all `.toml` bank files from a directory. Files that
/// fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>, BankError> {
    let read_err = |source| BankError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut banks = Vec::new();

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(read_err)?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// Load a bank file, or every bank under a directory.
pub fn load_banks(path: &Path) -> Result<Vec<QuestionBank>, BankError> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_question_bank(path)?])
    }
}

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

/// Validate a bank for issues that do not break a record's invariants.
pub fn validate_question_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |id: &str, message: String| {
        warnings.push(ValidationWarning {
            question_id: Some(id.to_string()),
            message,
        })
    };

    let mut seen_ids = HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(q.id.as_str()) {
            warn(&q.id, format!("duplicate question ID: {}", q.id));
        }
        if q.text.trim().is_empty() {
            warn(&q.id, "question text is empty".into());
        }
        if q.options.len() < 2 {
            warn(&q.id, "fewer than two options".into());
        }
        let distinct: HashSet<_> = q.options.iter().map(|o| o.trim()).collect();
        if distinct.len() != q.options.len() {
            warn(&q.id, "duplicate option text".into());
        }
        if q.explanation.trim().is_empty() {
            warn(&q.id, "no explanation provided".into());
        }
    }

    for difficulty in Difficulty::ALL {
        if !bank.questions.iter().any(|q| q.difficulty == difficulty) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!("no {difficulty} questions; mixed quizzes will come up short"),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TOML: &str = r#"
[bank]
id = "test-bank"
name = "Test Bank"
description = "A test bank"

[[questions]]
id = "q1"
text = "What is 2 + 2?"
type = "numerical"
category = "quantitative"
options = ["3", "4", "5"]
correct_answer_index = 1
explanation = "Basic addition."
difficulty = "easy"
points = 50
time_limit_secs = 20
hints = ["Count on your fingers."]
tags = ["arithmetic"]

[[questions]]
id = "q2"
text = "Odd one out: cat, dog, car, cow"
type = "logical"
category = "reasoning"
options = ["cat", "dog", "car", "cow"]
correct_answer_index = 2
explanation = "A car is not an animal."
difficulty = "hard"
"#;

    #[test]
    fn parse_valid_toml() {
        let bank = parse_question_bank_str(VALID_TOML, Path::new("test.toml")).unwrap();
        assert_eq!(bank.id, "test-bank");
        assert_eq!(bank.questions.len(), 2);

        let q1 = &bank.questions[0];
        assert_eq!(q1.kind, QuestionType::Numerical);
        assert_eq!(q1.category, Category::Quantitative);
        assert_eq!(q1.points, 50);
        assert_eq!(q1.time_limit_secs, 20);
        assert_eq!(q1.hints.len(), 1);
        assert!(q1.tags.contains("arithmetic"));
    }

    #[test]
    fn missing_points_and_limit_default_by_difficulty() {
        let bank = parse_question_bank_str(VALID_TOML, Path::new("test.toml")).unwrap();
        let q2 = &bank.questions[1];
        assert_eq!(q2.points, Difficulty::Hard.default_points());
        assert_eq!(q2.time_limit_secs, Difficulty::Hard.default_time_limit_secs());
        assert!(q2.tags.is_empty());
    }

    #[test]
    fn out_of_range_answer_is_rejected() {
        let toml = r#"
[bank]
id = "bad"
name = "Bad"

[[questions]]
id = "broken"
text = "?"
type = "verbal"
category = "english"
options = ["a", "b"]
correct_answer_index = 2
difficulty = "easy"
"#;
        let err = parse_question_bank_str(toml, Path::new("bad.toml")).unwrap_err();
        assert!(
            matches!(&err, BankError::InvalidQuestion { id, .. } if id == "broken"),
            "got {err}"
        );
    }

    #[test]
    fn unknown_category_is_rejected() {
        let toml = r#"
[bank]
id = "bad"
name = "Bad"

[[questions]]
id = "q"
text = "?"
type = "verbal"
category = "astrology"
options = ["a"]
correct_answer_index = 0
difficulty = "easy"
"#;
        let err = parse_question_bank_str(toml, Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("astrology"));
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_question_bank_str("not [valid toml }{", Path::new("bad.toml"));
        assert!(matches!(result, Err(BankError::Parse { .. })));
    }

    #[test]
    fn validate_duplicates_and_missing_tiers() {
        let mut bank = parse_question_bank_str(VALID_TOML, Path::new("test.toml")).unwrap();
        bank.questions.push(bank.questions[0].clone());
        bank.questions[1].explanation.clear();

        let warnings = validate_question_bank(&bank);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate question ID")));
        assert!(warnings.iter().any(|w| w.message.contains("no explanation")));
        assert!(warnings.iter().any(|w| w.message.contains("no medium questions")));
    }

    #[test]
    fn bundled_bank_is_valid_and_covers_every_tier() {
        let bank = bundled_bank().unwrap();
        assert!(bank.questions.len() >= 10);
        assert!(validate_question_bank(&bank).is_empty());
        for category in Category::ALL {
            assert!(bank.questions.iter().any(|q| q.category == category));
        }
        let count = |d| bank.questions.iter().filter(|q| q.difficulty == d).count();
        assert!(count(Difficulty::Easy) >= 4);
        assert!(count(Difficulty::Medium) >= 4);
        assert!(count(Difficulty::Hard) >= 2);
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "oops = [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].id, "test-bank");
    }
}

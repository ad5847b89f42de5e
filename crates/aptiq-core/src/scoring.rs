//! Per-answer scoring.
//!
//! A correct answer earns the question's points plus a time bonus of up to
//! 30% of the points, proportional to the unused fraction of the clock. A
//! wrong answer costs 25% of the points, a timeout 20%. All ratios are
//! applied in integer arithmetic and floored.

use crate::model::{AnsweredSlot, Question};

/// Time bonus ratio, as `numerator / denominator`.
const TIME_BONUS: (i64, i64) = (3, 10);
/// Penalty for a wrong selection.
const WRONG_PENALTY: (i64, i64) = (1, 4);
/// Penalty for letting the clock run out.
const TIMEOUT_PENALTY: (i64, i64) = (1, 5);

/// Score delta for one resolved question.
///
/// `time_remaining_secs` is clamped to the question's time limit. An
/// [`AnsweredSlot::Unanswered`] slot contributes nothing.
pub fn score_delta(question: &Question, slot: &AnsweredSlot, time_remaining_secs: u32) -> i64 {
    let points = i64::from(question.points);
    match *slot {
        AnsweredSlot::Selected(option) if question.is_correct(option) => {
            points + time_bonus(question, time_remaining_secs)
        }
        AnsweredSlot::Selected(_) => -(points * WRONG_PENALTY.0 / WRONG_PENALTY.1),
        AnsweredSlot::TimedOut => -(points * TIMEOUT_PENALTY.0 / TIMEOUT_PENALTY.1),
        AnsweredSlot::Unanswered => 0,
    }
}

/// `floor(remaining / limit * points * 0.3)`, computed exactly.
pub fn time_bonus(question: &Question, time_remaining_secs: u32) -> i64 {
    let limit = i64::from(question.time_limit_secs);
    if limit == 0 {
        return 0;
    }
    // The product needs more than 64 bits for large u32 inputs; the
    // quotient is at most 0.3 * points and always fits.
    let remaining = i128::from(time_remaining_secs).min(i128::from(limit));
    let points = i128::from(question.points);
    let bonus = remaining * points * i128::from(TIME_BONUS.0)
        / (i128::from(limit) * i128::from(TIME_BONUS.1));
    i64::try_from(bonus).unwrap_or(i64::MAX)
}

/// Final score as displayed: the raw score clamped at zero.
pub fn display_score(raw: i64) -> i64 {
    raw.max(0)
}

/// Highest delta a question can produce (correct with a full clock).
pub fn max_delta(question: &Question) -> i64 {
    score_delta(
        question,
        &AnsweredSlot::Selected(question.correct_answer_index),
        question.time_limit_secs,
    )
}

//! Per-question status and score totals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Correct,
    Wrong,
    Skipped,
    Multiple,
}

/// Status of one question from its filled bubble indices and the key's choice.
/// Several marks are never credited, even when one of them is the key.
pub fn question_status(filled: &[usize], key: usize) -> QuestionStatus {
    match filled {
        [] => QuestionStatus::Skipped,
        [only] if *only == key => QuestionStatus::Correct,
        [_] => QuestionStatus::Wrong,
        _ => QuestionStatus::Multiple,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub number: u32,
    pub key: usize,
    pub filled: Vec<usize>,
    pub status: QuestionStatus,
}

impl QuestionOutcome {
    pub fn new(number: u32, key: usize, filled: Vec<usize>) -> Self {
        let status = question_status(&filled, key);
        Self {
            number,
            key,
            filled,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
}

pub fn percentage(score: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        score as f64 / total as f64 * 100.0
    }
}

pub fn summarize(outcomes: &[QuestionOutcome]) -> ScoreSummary {
    let score = outcomes
        .iter()
        .filter(|o| o.status == QuestionStatus::Correct)
        .count();
    let total = outcomes.len();
    ScoreSummary {
        score,
        total,
        percentage: percentage(score, total),
    }
}

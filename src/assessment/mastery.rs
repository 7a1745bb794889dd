// src/assessment/mastery.rs

//! Mastery policy: running mean of per-question outcomes.
//!
//! Each scored question contributes a normalized outcome in [0, 1] (1 or 0 for
//! multiple choice, `total_marks / 10` for free-form answers). The new score is
//! the mean of all outcomes so far:
//!
//! `mastery' = mastery + (target - mastery) / (attempted + 1)`
//!
//! For free-form answers the target is clamped toward the verdict, so a
//! `correct` answer never lowers mastery and an `incorrect` one never raises it.

use crate::models::topic::{Classification, TopicRecord};

/// Mastery at or above this is `strong`, below it `weak`.
pub const STRONG_THRESHOLD: f64 = 0.40;

/// Outcome of one scored, non-errored answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Mcq { is_correct: bool },
    Qna { total_marks: u8, is_correct: bool },
}

impl Outcome {
    pub fn is_correct(&self) -> bool {
        match self {
            Outcome::Mcq { is_correct } | Outcome::Qna { is_correct, .. } => *is_correct,
        }
    }

    pub fn normalized(&self) -> f64 {
        match self {
            Outcome::Mcq { is_correct } => {
                if *is_correct {
                    1.0
                } else {
                    0.0
                }
            }
            Outcome::Qna { total_marks, .. } => (f64::from(*total_marks) / 10.0).clamp(0.0, 1.0),
        }
    }
}

/// New counters, score and label for a topic after one outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryUpdate {
    pub mastery_score: f64,
    pub questions_attempted: i64,
    pub correct_answers: i64,
    pub classification: Classification,
}

pub fn classify(mastery_score: f64, questions_attempted: i64) -> Classification {
    if questions_attempted <= 0 {
        Classification::Unassessed
    } else if mastery_score >= STRONG_THRESHOLD {
        Classification::Strong
    } else {
        Classification::Weak
    }
}

pub fn apply(previous: &TopicRecord, outcome: Outcome) -> MasteryUpdate {
    let attempted = previous.questions_attempted.max(0);
    let current = if attempted == 0 {
        0.0
    } else {
        previous.mastery_score.clamp(0.0, 1.0)
    };

    let target = match outcome {
        Outcome::Mcq { .. } => outcome.normalized(),
        Outcome::Qna { is_correct: true, .. } => outcome.normalized().max(current),
        Outcome::Qna { is_correct: false, .. } => outcome.normalized().min(current),
    };

    let questions_attempted = attempted + 1;
    let mastery_score =
        (current + (target - current) / questions_attempted as f64).clamp(0.0, 1.0);
    let correct_answers = previous.correct_answers.clamp(0, attempted)
        + i64::from(outcome.is_correct());

    MasteryUpdate {
        mastery_score,
        questions_attempted,
        correct_answers,
        classification: classify(mastery_score, questions_attempted),
    }
}

/// Mean mastery over assessed topics; 0 when nothing has been assessed.
pub fn overall_mastery(records: &[TopicRecord]) -> f64 {
    let assessed: Vec<f64> = records
        .iter()
        .filter(|r| r.is_assessed())
        .map(|r| r.mastery_score)
        .collect();
    if assessed.is_empty() {
        return 0.0;
    }
    assessed.iter().sum::<f64>() / assessed.len() as f64
}

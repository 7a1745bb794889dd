// src/models/evaluation.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    question::SessionType,
    topic::{Classification, TopicRecord},
};

pub const MAX_CONCEPT: u8 = 5;
pub const MAX_COMPLETENESS: u8 = 3;
pub const MAX_CLARITY: u8 = 2;
pub const MAX_TOTAL_MARKS: u8 = 10;

/// Correctness label attached to a free-form evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
}

/// Rubric breakdown of a free-form answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricScores {
    pub concept_score: u8,
    pub completeness_score: u8,
    pub clarity_score: u8,
    pub total_marks: u8,
}

impl RubricScores {
    pub fn new(concept: u8, completeness: u8, clarity: u8) -> Self {
        RubricScores {
            concept_score: concept,
            completeness_score: completeness,
            clarity_score: clarity,
            total_marks: concept + completeness + clarity,
        }
    }

    /// Range and sum checks. A rubric that fails is not a usable verdict.
    pub fn check(&self) -> Result<(), String> {
        if self.concept_score > MAX_CONCEPT
            || self.completeness_score > MAX_COMPLETENESS
            || self.clarity_score > MAX_CLARITY
        {
            return Err(format!(
                "Rubric sub-score out of range: concept {}/5, completeness {}/3, clarity {}/2",
                self.concept_score, self.completeness_score, self.clarity_score
            ));
        }
        let sum = self.concept_score + self.completeness_score + self.clarity_score;
        if sum != self.total_marks || self.total_marks > MAX_TOTAL_MARKS {
            return Err(format!(
                "Rubric total {} does not equal sub-score sum {}",
                self.total_marks, sum
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluationDetail {
    Mcq {
        is_correct: bool,
    },
    Qna {
        rubric: RubricScores,
        result: Verdict,
        rubric_evaluation: String,
    },
}

/// Scorer output for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub feedback: String,
    pub explanation: String,
    /// The scorer itself failed; this is not a verdict on the answer.
    #[serde(default)]
    pub evaluation_error: bool,
    pub detail: EvaluationDetail,
}

impl EvaluationResult {
    pub fn failed(session_type: SessionType, reason: impl Into<String>) -> Self {
        let detail = match session_type {
            SessionType::Mcq => EvaluationDetail::Mcq { is_correct: false },
            SessionType::Qna => EvaluationDetail::Qna {
                rubric: RubricScores::new(0, 0, 0),
                result: Verdict::Incorrect,
                rubric_evaluation: String::new(),
            },
        };
        EvaluationResult {
            feedback: reason.into(),
            explanation: String::new(),
            evaluation_error: true,
            detail,
        }
    }

    pub fn session_type(&self) -> SessionType {
        match self.detail {
            EvaluationDetail::Mcq { .. } => SessionType::Mcq,
            EvaluationDetail::Qna { .. } => SessionType::Qna,
        }
    }

    /// Something the learner can read before moving on.
    pub fn has_explanation(&self) -> bool {
        !self.feedback.trim().is_empty() || !self.explanation.trim().is_empty()
    }

    pub fn is_correct(&self) -> bool {
        match &self.detail {
            EvaluationDetail::Mcq { is_correct } => *is_correct,
            EvaluationDetail::Qna { result, .. } => *result == Verdict::Correct,
        }
    }

    /// Contribution to a session's running score.
    pub fn points(&self) -> u32 {
        match &self.detail {
            EvaluationDetail::Mcq { is_correct } => u32::from(*is_correct),
            EvaluationDetail::Qna { rubric, .. } => u32::from(rubric.total_marks),
        }
    }
}

/// DTO for submitting an answer to the pending question on a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 50))]
    pub topic: String,
    pub session_type: SessionType,
    #[validate(length(max = 5000))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QnaBreakdown {
    pub concept_score: u8,
    pub completeness_score: u8,
    pub clarity_score: u8,
    pub total_marks: u8,
    pub result: Verdict,
    pub rubric_evaluation: String,
}

/// Response to a scored submission: the verdict plus the updated record.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub topic: String,
    pub is_correct: bool,
    pub feedback: String,
    pub correct_explanation: String,
    pub mastery_score: f64,
    pub mastery_pct: i64,
    pub classification: Classification,
    pub questions_attempted: i64,
    pub correct_answers: i64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub qna: Option<QnaBreakdown>,
}

impl SubmissionResponse {
    pub fn new(evaluation: &EvaluationResult, record: &TopicRecord) -> Self {
        let qna = match &evaluation.detail {
            EvaluationDetail::Mcq { .. } => None,
            EvaluationDetail::Qna { rubric, result, rubric_evaluation } => Some(QnaBreakdown {
                concept_score: rubric.concept_score,
                completeness_score: rubric.completeness_score,
                clarity_score: rubric.clarity_score,
                total_marks: rubric.total_marks,
                result: *result,
                rubric_evaluation: rubric_evaluation.clone(),
            }),
        };
        SubmissionResponse {
            topic: record.name.clone(),
            is_correct: evaluation.is_correct(),
            feedback: evaluation.feedback.clone(),
            correct_explanation: evaluation.explanation.clone(),
            mastery_score: record.mastery_score,
            mastery_pct: record.mastery_pct(),
            classification: record.classification,
            questions_attempted: record.questions_attempted,
            correct_answers: record.correct_answers,
            qna,
        }
    }
}

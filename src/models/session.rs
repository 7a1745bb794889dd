// src/models/session.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    evaluation::SubmissionResponse,
    question::{PublicQuestion, SessionType},
};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub session_type: SessionType,
}

/// Sets membership of one topic in the session scope.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectTopicRequest {
    #[validate(length(min = 1, max = 50))]
    pub topic: String,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct QuestionCountRequest {
    /// Range-checked by the session controller, not at deserialization.
    pub question_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SessionAnswerRequest {
    #[validate(length(max = 5000))]
    pub answer: String,
}

/// Final score of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_type: SessionType,
    pub question_count: u32,
    /// Correct answers for MCQ, total marks for QNA.
    pub score: u32,
    /// `question_count` for MCQ, `question_count * 10` for QNA.
    pub max_score: u32,
}

/// Snapshot of a user's assessment session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    pub selected_topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<String>,
    pub explanation_shown: bool,
    pub can_advance: bool,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct SessionQuestionResponse {
    pub question: PublicQuestion,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct SessionAnswerResponse {
    pub evaluation: SubmissionResponse,
    pub session: SessionView,
}

// src/clients/ollama.rs

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    clients::{QuestionGenerator, Scorer},
    error::AppError,
    models::{
        evaluation::{EvaluationDetail, EvaluationResult, RubricScores, Verdict},
        question::{
            LengthTier, McqOption, Question, QuestionBody, QuestionRequest, SessionType,
        },
    },
    utils::html::clean_html,
};

/// Free-form answers scoring at least this many marks count as correct.
pub const QNA_PASS_MARKS: u8 = 4;

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence pattern is valid")
});

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model output contained no JSON object")]
    NoJson,
    #[error("model output rejected: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct RawMcq {
    question: String,
    options: Map<String, Value>,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct RawQna {
    question: String,
}

#[derive(Debug, Deserialize)]
struct RawMcqEvaluation {
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    correct_explanation: String,
}

#[derive(Debug, Deserialize)]
struct RawQnaEvaluation {
    concept_score: u8,
    completeness_score: u8,
    clarity_score: u8,
    total_marks: u8,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    rubric_evaluation: String,
    #[serde(default)]
    correct_explanation: String,
}

/// Question generator and scorer backed by an Ollama `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    /// One completion request, parsed down to the first JSON object in the output.
    async fn complete_json(&self, prompt: &str) -> Result<Value, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let resp = self.client.post(&url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus { status, body });
        }
        let body: GenerateResponse = resp.json().await?;
        extract_json(&body.response).ok_or(LlmError::NoJson)
    }

    async fn generate_inner(&self, request: &QuestionRequest) -> Result<Question, LlmError> {
        let prompt = generation_prompt(request);
        let value = self.complete_json(&prompt).await?;
        parse_question(value, request)
    }

    async fn evaluate_inner(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<EvaluationResult, LlmError> {
        let prompt = evaluation_prompt(question, answer);
        let value = self.complete_json(&prompt).await?;
        parse_evaluation(value, question, answer)
    }
}

#[async_trait]
impl QuestionGenerator for OllamaClient {
    async fn generate(&self, request: &QuestionRequest) -> Result<Question, AppError> {
        self.generate_inner(request).await.map_err(|e| {
            tracing::warn!(topic = %request.topic, "Question generation failed: {}", e);
            AppError::Generation(format!(
                "Could not generate a question about '{}'. Please try again.",
                request.topic
            ))
        })
    }
}

#[async_trait]
impl Scorer for OllamaClient {
    async fn evaluate(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<EvaluationResult, AppError> {
        match self.evaluate_inner(question, answer).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(topic = %question.topic, "Answer evaluation failed: {}", e);
                Ok(EvaluationResult::failed(
                    question.session_type(),
                    "We could not evaluate your answer. Please submit it again.",
                ))
            }
        }
    }
}

/// Pulls a JSON object out of model output: the whole text, a fenced block,
/// or the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    let parse = |s: &str| serde_json::from_str::<Value>(s).ok().filter(Value::is_object);

    if let Some(value) = parse(text) {
        return Some(value);
    }
    if let Some(value) = FENCED_JSON_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse(m.as_str()))
    {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse(&text[start..=end])
}

fn generation_prompt(request: &QuestionRequest) -> String {
    let context = if request.explanation_summary.trim().is_empty() {
        String::new()
    } else {
        format!("\nWhat the learner was taught:\n{}\n", request.explanation_summary.trim())
    };

    match request.session_type {
        SessionType::Mcq => format!(
            "Create one multiple choice question about {topic} for a learner at the {difficulty} level.\
             {context}\n\
             Return JSON only: {{\"question\": \"...\", \"options\": {{\"A\": \"...\", \"B\": \"...\", \"C\": \"...\", \"D\": \"...\"}}, \
             \"correct_answer\": \"A\", \"explanation\": \"why the correct option is right\"}}",
            topic = request.topic,
            difficulty = request.difficulty.as_str(),
            context = context,
        ),
        SessionType::Qna => format!(
            "Create one open question about {topic} for a learner at the {difficulty} level. \
             It should expect a {length} written answer.\
             {context}\n\
             Return JSON only: {{\"question\": \"...\"}}",
            topic = request.topic,
            difficulty = request.difficulty.as_str(),
            length = length_name(request.length),
            context = context,
        ),
    }
}

fn evaluation_prompt(question: &Question, answer: &str) -> String {
    match &question.body {
        QuestionBody::Mcq { options, correct_label, explanation } => {
            let listed: Vec<String> = options
                .iter()
                .map(|o| format!("{}: {}", o.label, o.text))
                .collect();
            format!(
                "A learner answered a multiple choice question about {topic}.\n\
                 Question: {stem}\nOptions:\n{options}\n\
                 Correct option: {correct}. {explanation}\n\
                 Learner selected: {answer}\n\
                 Explain briefly why the correct option is right and, if the learner was wrong, \
                 what they may have misunderstood.\n\
                 Return JSON only: {{\"feedback\": \"...\", \"correct_explanation\": \"...\"}}",
                topic = question.topic,
                stem = question.stem,
                options = listed.join("\n"),
                correct = correct_label,
                explanation = explanation,
                answer = answer.trim(),
            )
        }
        QuestionBody::Qna { length } => format!(
            "Evaluate a learner's {length} answer to a question about {topic}.\n\
             Question: {stem}\nAnswer: {answer}\n\
             Score with this rubric: concept correctness 0-5, completeness 0-3, clarity 0-2. \
             total_marks is their sum.\n\
             Return JSON only: {{\"concept_score\": 0, \"completeness_score\": 0, \"clarity_score\": 0, \
             \"total_marks\": 0, \"feedback\": \"...\", \"rubric_evaluation\": \"...\", \
             \"correct_explanation\": \"what a complete answer covers\"}}",
            length = length_name(*length),
            topic = question.topic,
            stem = question.stem,
            answer = answer.trim(),
        ),
    }
}

fn length_name(length: LengthTier) -> &'static str {
    match length {
        LengthTier::Short => "short",
        LengthTier::Medium => "medium",
        LengthTier::Long => "long",
    }
}

fn parse_question(value: Value, request: &QuestionRequest) -> Result<Question, LlmError> {
    let (stem, body) = match request.session_type {
        SessionType::Mcq => {
            let raw: RawMcq = serde_json::from_value(value)?;
            let options = raw
                .options
                .into_iter()
                .map(|(label, text)| McqOption {
                    label: label.trim().to_string(),
                    text: clean_html(text.as_str().unwrap_or_default()),
                })
                .collect();
            let body = QuestionBody::Mcq {
                options,
                correct_label: raw.correct_answer.trim().to_string(),
                explanation: clean_html(&raw.explanation),
            };
            (raw.question, body)
        }
        SessionType::Qna => {
            let raw: RawQna = serde_json::from_value(value)?;
            (raw.question, QuestionBody::Qna { length: request.length })
        }
    };

    let question = Question {
        id: Uuid::new_v4(),
        topic: request.topic.clone(),
        stem: clean_html(stem.trim()),
        difficulty: request.difficulty,
        body,
    };
    question
        .check_shape(request.session_type)
        .map_err(LlmError::Invalid)?;
    Ok(question)
}

fn parse_evaluation(
    value: Value,
    question: &Question,
    answer: &str,
) -> Result<EvaluationResult, LlmError> {
    match &question.body {
        QuestionBody::Mcq { correct_label, .. } => {
            let raw: RawMcqEvaluation = serde_json::from_value(value)?;
            let is_correct = answer.trim().eq_ignore_ascii_case(correct_label.trim());
            Ok(EvaluationResult {
                feedback: clean_html(&raw.feedback),
                explanation: clean_html(&raw.correct_explanation),
                evaluation_error: false,
                detail: EvaluationDetail::Mcq { is_correct },
            })
        }
        QuestionBody::Qna { .. } => {
            let raw: RawQnaEvaluation = serde_json::from_value(value)?;
            let rubric = RubricScores {
                concept_score: raw.concept_score,
                completeness_score: raw.completeness_score,
                clarity_score: raw.clarity_score,
                total_marks: raw.total_marks,
            };
            let result = if raw.total_marks >= QNA_PASS_MARKS {
                Verdict::Correct
            } else {
                Verdict::Incorrect
            };
            Ok(EvaluationResult {
                feedback: clean_html(&raw.feedback),
                explanation: clean_html(&raw.correct_explanation),
                evaluation_error: false,
                detail: EvaluationDetail::Qna {
                    rubric,
                    result,
                    rubric_evaluation: clean_html(&raw.rubric_evaluation),
                },
            })
        }
    }
}

// src/clients/mod.rs

//! External collaborators of the assessment engine.
//!
//! Both calls are slow and may fail; neither is ever retried here.

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        evaluation::EvaluationResult,
        question::{Question, QuestionRequest},
    },
};

pub mod ollama;

/// Produces one question for a topic.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Errors are reported as `AppError::Generation`.
    async fn generate(&self, request: &QuestionRequest) -> Result<Question, AppError>;
}

/// Judges one answer against the question it was given for.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// A scorer that ran but could not reach a verdict returns a result with
    /// `evaluation_error` set rather than guessing.
    async fn evaluate(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<EvaluationResult, AppError>;
}

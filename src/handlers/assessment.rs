// src/handlers/assessment.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    assessment::AssessmentEngine,
    error::AppError,
    models::{evaluation::SubmitAnswerRequest, question::GenerateQuestionRequest},
    utils::jwt::Claims,
};

/// Generates a question on a taught topic.
///
/// The answer key stays on the server; the response only carries the stem and
/// the options (MCQ) or the expected answer length (QNA).
pub async fn generate_question(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = engine
        .generate_question(
            &claims.sub,
            &payload.topic,
            payload.session_type,
            payload.length.unwrap_or_default(),
        )
        .await?;

    Ok(Json(question))
}

/// Submits an answer to the pending question on a topic.
pub async fn submit_answer(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = engine
        .submit_answer(&claims.sub, &payload.topic, payload.session_type, &payload.answer)
        .await?;

    Ok(Json(response))
}

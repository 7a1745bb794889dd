// src/handlers/session.rs

//! Assessment session routes. Each returns the session view after the action.

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    assessment::AssessmentEngine,
    error::AppError,
    models::session::{
        QuestionCountRequest, SelectTopicRequest, SessionAnswerRequest, StartSessionRequest,
    },
    utils::jwt::Claims,
};

pub async fn get_session(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    Json(engine.session_view(&claims.sub).await)
}

pub async fn start(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = engine.start_session(&claims.sub, payload.session_type).await?;
    Ok(Json(view))
}

pub async fn select_topic(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SelectTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let view = engine
        .select_topic(&claims.sub, &payload.topic, payload.selected)
        .await?;
    Ok(Json(view))
}

pub async fn confirm_scope(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.confirm_scope(&claims.sub).await?))
}

pub async fn confirm_count(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionCountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = engine
        .confirm_count(&claims.sub, payload.question_count)
        .await?;
    Ok(Json(view))
}

/// Generates (or regenerates) the question for the current index.
pub async fn next_question(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.next_question(&claims.sub).await?))
}

pub async fn submit_answer(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SessionAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let response = engine
        .submit_session_answer(&claims.sub, &payload.answer)
        .await?;
    Ok(Json(response))
}

/// Moves past a reviewed question. Refused until the explanation gate opens.
pub async fn advance(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.advance(&claims.sub).await?))
}

pub async fn cancel(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.cancel(&claims.sub).await?))
}

/// Clears a completed or cancelled session.
pub async fn dismiss(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.dismiss(&claims.sub).await?))
}

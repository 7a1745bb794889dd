// src/handlers/topic.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    assessment::AssessmentEngine,
    error::AppError,
    models::topic::{TeachTopicRequest, TopicEntry},
    utils::jwt::Claims,
};

/// Registers a topic the learner has just been taught.
///
/// Returns 201 Created for a new topic. Teaching a topic again (names compare
/// case-insensitively) returns 200 with the existing record untouched.
pub async fn teach_topic(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<TeachTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let (record, created) = engine
        .teach_topic(&claims.sub, &payload.name, payload.explanation_summary.trim())
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(TopicEntry::from(&record))))
}

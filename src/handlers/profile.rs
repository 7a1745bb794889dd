// src/handlers/profile.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    assessment::AssessmentEngine, error::AppError, models::topic::AreasParams,
    utils::jwt::Claims,
};

/// Learner profile: topic names by classification and overall mastery.
pub async fn get_profile(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let profile = engine.get_topic_profile(&claims.sub).await?;
    Ok(Json(profile))
}

/// Every taught topic with its counters.
pub async fn list_topics(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let topics = engine.list_topics(&claims.sub).await?;
    Ok(Json(topics))
}

/// Weak and strong areas, each capped at `max_display` entries.
pub async fn get_areas(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AreasParams>,
) -> Result<impl IntoResponse, AppError> {
    let areas = engine.areas(&claims.sub, params.max_display).await?;
    Ok(Json(areas))
}

/// Deletes all of the learner's topics and any session in progress.
pub async fn reset(
    State(engine): State<Arc<AssessmentEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let removed = engine.reset_all(&claims.sub).await?;
    Ok(Json(json!({ "removed_topics": removed })))
}

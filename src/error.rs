// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Carries the assessment error taxonomy plus infrastructure failures,
/// and maps each onto an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 422 Unprocessable Entity: empty, gibberish or malformed input. Resubmit.
    Validation(String),

    // 404 Not Found: assessment requested on a topic that was never taught.
    UnknownTopic(String),

    // 502 Bad Gateway: the question generator failed. Retryable.
    Generation(String),

    // 502 Bad Gateway: the scorer ran but produced no verdict. Retryable.
    Evaluation(String),

    // 409 Conflict: action not valid for the current session state.
    StateTransition(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),
}

impl AppError {
    /// Stable snake_case name of the variant, sent to clients as `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::UnknownTopic(_) => "unknown_topic",
            AppError::Generation(_) => "generation_error",
            AppError::Evaluation(_) => "evaluation_error",
            AppError::StateTransition(_) => "state_transition_error",
            AppError::InternalServerError(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::AuthError(_) => "auth_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
        }
    }

    /// Whether the caller may simply try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Generation(_) | AppError::Evaluation(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownTopic(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Generation(_) | AppError::Evaluation(_) => StatusCode::BAD_GATEWAY,
            AppError::StateTransition(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UnknownTopic(topic) => write!(f, "Topic '{}' has not been taught yet", topic),
            AppError::Validation(msg)
            | AppError::Generation(msg)
            | AppError::Evaluation(msg)
            | AppError::StateTransition(msg)
            | AppError::InternalServerError(msg)
            | AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": error_message,
            "kind": self.kind(),
        });
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::UnknownTopic("Osmosis".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::StateTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Evaluation("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_only_external_failures_are_retryable() {
        assert!(AppError::Generation("x".into()).is_retryable());
        assert!(AppError::Evaluation("x".into()).is_retryable());
        assert!(!AppError::Validation("x".into()).is_retryable());
        assert!(!AppError::StateTransition("x".into()).is_retryable());
    }

    #[test]
    fn test_unknown_topic_message_names_topic() {
        let msg = AppError::UnknownTopic("Osmosis".into()).to_string();
        assert!(msg.contains("Osmosis"));
    }
}

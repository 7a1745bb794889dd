// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessment, health, profile, session, topic},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * `/health` is public; everything under `/api` requires a bearer token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let topic_routes = Router::new()
        .route("/topics", get(profile::list_topics).post(topic::teach_topic))
        .route("/profile", get(profile::get_profile))
        .route("/areas", get(profile::get_areas))
        .route("/reset", post(profile::reset));

    let assessment_routes = Router::new()
        .route("/question", post(assessment::generate_question))
        .route("/answer", post(assessment::submit_answer));

    let session_routes = Router::new()
        .route("/", get(session::get_session))
        .route("/start", post(session::start))
        .route("/topics", post(session::select_topic))
        .route("/scope/confirm", post(session::confirm_scope))
        .route("/count", post(session::confirm_count))
        .route("/question", post(session::next_question))
        .route("/answer", post(session::submit_answer))
        .route("/advance", post(session::advance))
        .route("/cancel", post(session::cancel))
        .route("/dismiss", post(session::dismiss));

    let api_routes = Router::new()
        .merge(topic_routes)
        .nest("/assessment", assessment_routes)
        .nest("/session", session_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

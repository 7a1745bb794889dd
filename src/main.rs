// src/main.rs

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use mastery_backend::assessment::{AssessmentEngine, store::TopicStore};
use mastery_backend::clients::ollama::OllamaClient;
use mastery_backend::config::Config;
use mastery_backend::routes;
use mastery_backend::state::AppState;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL must be a valid SQLite URL")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(connect_options)
        .await
        .expect("Failed to open the database");

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let llm = Arc::new(
        OllamaClient::new(&config.llm_base_url, &config.llm_model, config.llm_timeout())
            .expect("Failed to build the LLM HTTP client"),
    );
    tracing::info!(
        "Using model '{}' at {} (explanation dwell {} ms)",
        config.llm_model,
        config.llm_base_url,
        config.explanation_dwell_ms
    );

    let engine = AssessmentEngine::new(
        TopicStore::new(pool.clone()),
        llm.clone(),
        llm,
        config.explanation_dwell(),
    );

    let state = AppState {
        pool,
        config: config.clone(),
        engine: Arc::new(engine),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

/// Minimum time a scored question's explanation stays on screen before
/// the learner may move on.
pub const DEFAULT_EXPLANATION_DWELL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub explanation_dwell_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://mastery.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let llm_base_url = env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        Url::parse(&llm_base_url).expect("LLM_BASE_URL must be a valid URL");

        let llm_model = env::var("LLM_MODEL")
            .unwrap_or_else(|_| "llama3".to_string());

        let llm_timeout_secs = parse_u64("LLM_TIMEOUT_SECS").unwrap_or(30);

        let explanation_dwell_ms =
            parse_u64("EXPLANATION_DWELL_MS").unwrap_or(DEFAULT_EXPLANATION_DWELL_MS);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            llm_base_url,
            llm_model,
            llm_timeout_secs,
            explanation_dwell_ms,
        }
    }

    pub fn explanation_dwell(&self) -> Duration {
        Duration::from_millis(self.explanation_dwell_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

fn parse_u64(key: &str) -> Option<u64> {
    env::var(key).ok()?.trim().parse().ok()
}

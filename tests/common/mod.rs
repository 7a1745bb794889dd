// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mastery_backend::{
    assessment::{AssessmentEngine, store::TopicStore},
    clients::{QuestionGenerator, Scorer},
    config::Config,
    error::AppError,
    models::{
        evaluation::{EvaluationDetail, EvaluationResult, RubricScores, Verdict},
        question::{McqOption, Question, QuestionBody, QuestionRequest, SessionType},
    },
    routes,
    state::AppState,
    utils::jwt::sign_jwt,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test_secret_for_integration_tests";

/// Generator with a fixed answer key: every MCQ has options A-D and "A" is correct.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(&self, request: &QuestionRequest) -> Result<Question, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Generation("generator unavailable".to_string()));
        }
        let body = match request.session_type {
            SessionType::Mcq => QuestionBody::Mcq {
                options: ["A", "B", "C", "D"]
                    .iter()
                    .map(|l| McqOption {
                        label: l.to_string(),
                        text: format!("{} option {}", request.topic, l),
                    })
                    .collect(),
                correct_label: "A".to_string(),
                explanation: format!("Option A describes {} correctly.", request.topic),
            },
            SessionType::Qna => QuestionBody::Qna { length: request.length },
        };
        Ok(Question {
            id: Uuid::new_v4(),
            topic: request.topic.clone(),
            stem: format!("A question about {}", request.topic),
            difficulty: request.difficulty,
            body,
        })
    }
}

/// Scorer that always claims MCQ answers are right (the engine decides by
/// label) and grades QNA answers by whether they mention "force".
/// `delay_ms` holds each evaluation open; `blank_text` drops the feedback.
#[derive(Default)]
pub struct ScriptedScorer {
    pub evaluation_error: AtomicBool,
    pub blank_text: AtomicBool,
    pub delay_ms: AtomicU64,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn evaluate(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<EvaluationResult, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.evaluation_error.load(Ordering::SeqCst) {
            return Ok(EvaluationResult::failed(question.session_type(), "scorer offline"));
        }
        let detail = match question.body {
            QuestionBody::Mcq { .. } => EvaluationDetail::Mcq { is_correct: true },
            QuestionBody::Qna { .. } => {
                if answer.to_lowercase().contains("force") {
                    EvaluationDetail::Qna {
                        rubric: RubricScores::new(4, 2, 2),
                        result: Verdict::Correct,
                        rubric_evaluation: "Covers the key idea.".to_string(),
                    }
                } else {
                    EvaluationDetail::Qna {
                        rubric: RubricScores::new(1, 1, 0),
                        result: Verdict::Incorrect,
                        rubric_evaluation: "Misses the key idea.".to_string(),
                    }
                }
            }
        };
        let feedback = if self.blank_text.load(Ordering::SeqCst) {
            String::new()
        } else {
            "Thanks for your answer.".to_string()
        };
        Ok(EvaluationResult {
            feedback,
            explanation: String::new(),
            evaluation_error: false,
            detail,
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub token: String,
    pub generator: Arc<ScriptedGenerator>,
    pub scorer: Arc<ScriptedScorer>,
}

impl TestApp {
    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn teach(&self, name: &str) -> reqwest::Response {
        self.post(
            "/api/topics",
            serde_json::json!({ "name": name, "explanation_summary": format!("All about {}", name) }),
        )
        .await
    }

    pub async fn topic(&self, name: &str) -> Value {
        let topics: Value = self.get("/api/topics").await.json().await.unwrap();
        topics["all_topics"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["name"] == name)
            .cloned()
            .unwrap_or_else(|| panic!("topic {} not found", name))
    }
}

/// Spawns the app on a random port with an in-memory database and scripted
/// collaborators. `dwell_ms` is the explanation gate's minimum dwell.
pub async fn spawn_app(dwell_ms: u64) -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        llm_base_url: "http://127.0.0.1:9".to_string(),
        llm_model: "test".to_string(),
        llm_timeout_secs: 1,
        explanation_dwell_ms: dwell_ms,
    };

    let generator = Arc::new(ScriptedGenerator::default());
    let scorer = Arc::new(ScriptedScorer::default());
    let engine = AssessmentEngine::new(
        TopicStore::new(pool.clone()),
        generator.clone(),
        scorer.clone(),
        Duration::from_millis(dwell_ms),
    );

    let state = AppState {
        pool,
        config,
        engine: Arc::new(engine),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let token = sign_jwt(&format!("learner-{}", Uuid::new_v4()), TEST_SECRET, 600).unwrap();

    TestApp {
        address,
        client: reqwest::Client::new(),
        token,
        generator,
        scorer,
    }
}

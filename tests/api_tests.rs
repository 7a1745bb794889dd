// tests/api_tests.rs

mod common;

use std::sync::atomic::Ordering;

use common::spawn_app;
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app(50).await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn api_requires_token() {
    let app = spawn_app(50).await;

    let response = app
        .client
        .get(format!("{}/api/profile", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn teaching_is_case_insensitive_and_idempotent() {
    let app = spawn_app(50).await;

    let first = app.teach("Photosynthesis").await;
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["classification"], "unassessed");
    assert_eq!(first["questions_attempted"], 0);

    let again = app.teach("photosynthesis").await;
    assert_eq!(again.status().as_u16(), 200);
    let again: Value = again.json().await.unwrap();
    assert_eq!(again["name"], "Photosynthesis");

    let topics: Value = app.get("/api/topics").await.json().await.unwrap();
    assert_eq!(topics["all_topics"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn teaching_rejects_bad_names() {
    let app = spawn_app(50).await;

    for name in ["ab", "Cells; DROP TABLE"] {
        let response = app.teach(name).await;
        assert_eq!(response.status().as_u16(), 422, "name {:?}", name);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "validation_error");
    }
}

#[tokio::test]
async fn untaught_topic_is_unknown() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;

    let response = app
        .post(
            "/api/assessment/question",
            json!({ "topic": "Osmosis", "session_type": "MCQ" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unknown_topic");
    assert_eq!(app.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mcq_question_hides_answer_key() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;

    let response = app
        .post(
            "/api/assessment/question",
            json!({ "topic": "photosynthesis", "session_type": "MCQ" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let question: Value = response.json().await.unwrap();
    assert_eq!(question["topic"], "Photosynthesis");
    assert_eq!(question["difficulty"], "beginner");
    assert_eq!(question["options"].as_array().unwrap().len(), 4);
    assert!(question.get("correct_label").is_none());
    assert!(question.get("explanation").is_none());
}

#[tokio::test]
async fn mcq_answer_uses_label_match() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;

    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;

    // The scorer claims every MCQ answer is right; the label decides.
    let response = app
        .post(
            "/api/assessment/answer",
            json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "B" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["is_correct"], false);
    assert_eq!(result["questions_attempted"], 1);
    assert_eq!(result["correct_answers"], 0);
    assert_eq!(result["classification"], "weak");
    assert!(!result["correct_explanation"].as_str().unwrap().is_empty());

    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;
    let result: Value = app
        .post(
            "/api/assessment/answer",
            json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "a" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["is_correct"], true);
    assert_eq!(result["questions_attempted"], 2);
    assert_eq!(result["correct_answers"], 1);
    assert_eq!(result["mastery_pct"], 50);
    assert_eq!(result["classification"], "strong");
}

#[tokio::test]
async fn answer_without_pending_question_is_rejected() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;

    let response = app
        .post(
            "/api/assessment/answer",
            json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "A" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "state_transition_error");
}

#[tokio::test]
async fn pending_question_is_consumed_by_one_answer() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;
    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;

    let answer = json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "A" });
    assert_eq!(app.post("/api/assessment/answer", answer.clone()).await.status().as_u16(), 200);
    assert_eq!(app.post("/api/assessment/answer", answer).await.status().as_u16(), 409);

    let topic = app.topic("Photosynthesis").await;
    assert_eq!(topic["questions_attempted"], 1);
}

#[tokio::test]
async fn concurrent_answers_commit_once() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;
    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;
    app.scorer.delay_ms.store(200, Ordering::SeqCst);

    let answer = json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "A" });
    let (first, second) = tokio::join!(
        app.post("/api/assessment/answer", answer.clone()),
        app.post("/api/assessment/answer", answer),
    );

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
    let topic = app.topic("Photosynthesis").await;
    assert_eq!(topic["questions_attempted"], 1);
    assert_eq!(topic["correct_answers"], 1);
}

#[tokio::test]
async fn mcq_answer_must_name_an_option() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;
    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;

    let response = app
        .post(
            "/api/assessment/answer",
            json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.scorer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gibberish_qna_answer_changes_nothing() {
    let app = spawn_app(50).await;
    app.teach("Newtonian Mechanics").await;
    app.post(
        "/api/assessment/question",
        json!({ "topic": "Newtonian Mechanics", "session_type": "QNA", "length": "short" }),
    )
    .await;

    for answer in ["asdf asdf asdf", "qwerty", ""] {
        let response = app
            .post(
                "/api/assessment/answer",
                json!({ "topic": "Newtonian Mechanics", "session_type": "QNA", "answer": answer }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 422, "answer {:?}", answer);
    }

    assert_eq!(app.scorer.calls.load(Ordering::SeqCst), 0);
    let topic = app.topic("Newtonian Mechanics").await;
    assert_eq!(topic["questions_attempted"], 0);
    assert_eq!(topic["classification"], "unassessed");

    // The pending question survives a rejected answer.
    let response = app
        .post(
            "/api/assessment/answer",
            json!({
                "topic": "Newtonian Mechanics",
                "session_type": "QNA",
                "answer": "Newton's second law states that force equals mass times acceleration"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["is_correct"], true);
    assert_eq!(result["total_marks"], 8);
    assert_eq!(result["result"], "correct");
    assert_eq!(result["mastery_pct"], 80);
}

#[tokio::test]
async fn evaluation_error_leaves_record_untouched() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;
    app.post(
        "/api/assessment/question",
        json!({ "topic": "Photosynthesis", "session_type": "MCQ" }),
    )
    .await;
    let before = app.topic("Photosynthesis").await;

    app.scorer.evaluation_error.store(true, Ordering::SeqCst);
    let answer = json!({ "topic": "Photosynthesis", "session_type": "MCQ", "answer": "A" });
    for _ in 0..2 {
        let response = app.post("/api/assessment/answer", answer.clone()).await;
        assert_eq!(response.status().as_u16(), 502);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "evaluation_error");
        assert_eq!(body["retryable"], true);
    }
    assert_eq!(app.topic("Photosynthesis").await, before);

    // A caller-initiated retry against the same question succeeds once.
    app.scorer.evaluation_error.store(false, Ordering::SeqCst);
    let response = app.post("/api/assessment/answer", answer).await;
    assert_eq!(response.status().as_u16(), 200);
    let after = app.topic("Photosynthesis").await;
    assert_eq!(after["questions_attempted"], 1);
    assert_eq!(after["correct_answers"], 1);
}

#[tokio::test]
async fn generation_failure_is_retryable() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;
    app.generator.fail.store(true, Ordering::SeqCst);

    let request = json!({ "topic": "Photosynthesis", "session_type": "QNA" });
    let response = app.post("/api/assessment/question", request.clone()).await;
    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "generation_error");
    assert_eq!(app.generator.calls.load(Ordering::SeqCst), 1);

    app.generator.fail.store(false, Ordering::SeqCst);
    let response = app.post("/api/assessment/question", request).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn profile_areas_and_reset() {
    let app = spawn_app(50).await;
    for name in ["Photosynthesis", "Osmosis", "Cell Division"] {
        app.teach(name).await;
    }

    // Photosynthesis right, Osmosis wrong, Cell Division untouched.
    for (topic, answer) in [("Photosynthesis", "A"), ("Osmosis", "C")] {
        app.post(
            "/api/assessment/question",
            json!({ "topic": topic, "session_type": "MCQ" }),
        )
        .await;
        let response = app
            .post(
                "/api/assessment/answer",
                json!({ "topic": topic, "session_type": "MCQ", "answer": answer }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let profile: Value = app.get("/api/profile").await.json().await.unwrap();
    assert_eq!(profile["all_topics"].as_array().unwrap().len(), 3);
    assert_eq!(profile["strong_topics"], json!(["Photosynthesis"]));
    assert_eq!(profile["weak_topics"], json!(["Osmosis"]));
    assert_eq!(profile["overall_mastery"], 0.5);
    assert_eq!(profile["mastery_display"], "50%");
    assert_eq!(profile["knowledge_level"], "strong");

    let areas: Value = app.get("/api/areas?max_display=0").await.json().await.unwrap();
    assert_eq!(areas["weak"]["areas"].as_array().unwrap().len(), 0);
    assert_eq!(areas["weak"]["more_count"], 1);
    assert_eq!(areas["strong"]["more_count"], 1);

    let areas: Value = app.get("/api/areas").await.json().await.unwrap();
    assert_eq!(areas["strong"]["areas"][0]["name"], "Photosynthesis");
    assert_eq!(areas["strong"]["areas"][0]["mastery_pct"], 100);
    assert!(areas["strong"]["areas"][0]["last_assessed"].is_string());

    let reset: Value = app.post("/api/reset", json!({})).await.json().await.unwrap();
    assert_eq!(reset["removed_topics"], 3);

    let profile: Value = app.get("/api/profile").await.json().await.unwrap();
    assert_eq!(profile["all_topics"].as_array().unwrap().len(), 0);
    assert_eq!(profile["knowledge_level"], "unassessed");
    assert_eq!(profile["mastery_display"], "0%");
}

#[tokio::test]
async fn users_are_isolated() {
    let app = spawn_app(50).await;
    app.teach("Photosynthesis").await;

    let other = mastery_backend::utils::jwt::sign_jwt("someone-else", common::TEST_SECRET, 600)
        .unwrap();
    let response = app
        .client
        .get(format!("{}/api/topics", app.address))
        .bearer_auth(other)
        .send()
        .await
        .unwrap();
    let topics: Value = response.json().await.unwrap();
    assert_eq!(topics["all_topics"].as_array().unwrap().len(), 0);
}

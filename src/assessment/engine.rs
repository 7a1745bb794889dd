// src/assessment/engine.rs

//! Facade over the topic store, the collaborators and the per-user session.
//!
//! Every mutation for a user happens while holding that user's slot lock.
//! The lock is released around generator and scorer calls; after such a call
//! the engine re-checks that the question it worked on is still current
//! before committing anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::{
    assessment::{
        mastery::{self, Outcome},
        session::{Phase, SessionEvent, SessionState},
        store::{TopicStore, name_key},
        validator,
    },
    clients::{QuestionGenerator, Scorer},
    error::AppError,
    models::{
        evaluation::{EvaluationDetail, EvaluationResult, SubmissionResponse, Verdict},
        question::{Difficulty, LengthTier, PublicQuestion, Question, QuestionBody, QuestionRequest, SessionType},
        session::{SessionAnswerResponse, SessionQuestionResponse, SessionView},
        topic::{
            AreaEntry, AreaList, AreasResponse, Classification, ProfileResponse, TopicEntry,
            TopicListResponse, TopicRecord,
        },
    },
};

/// Default cap on how many weak or strong areas are listed.
pub const DEFAULT_MAX_DISPLAY: usize = 10;

/// Per-user mutable state that lives outside the database.
#[derive(Default)]
struct UserSlot {
    session: SessionState,
    /// Standalone questions awaiting an answer, keyed by topic key and type.
    pending: HashMap<(String, SessionType), Question>,
    dwell_task: Option<AbortHandle>,
}

impl UserSlot {
    fn cancel_dwell(&mut self) {
        if let Some(handle) = self.dwell_task.take() {
            handle.abort();
        }
    }
}

pub struct AssessmentEngine {
    store: TopicStore,
    generator: Arc<dyn QuestionGenerator>,
    scorer: Arc<dyn Scorer>,
    slots: Mutex<HashMap<String, Arc<Mutex<UserSlot>>>>,
    tickets: AtomicU64,
    dwell: Duration,
}

impl AssessmentEngine {
    pub fn new(
        store: TopicStore,
        generator: Arc<dyn QuestionGenerator>,
        scorer: Arc<dyn Scorer>,
        dwell: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            scorer,
            slots: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(1),
            dwell,
        }
    }

    async fn slot(&self, user_id: &str) -> Arc<Mutex<UserSlot>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(user_id.to_string()).or_default())
    }

    /// Drops the user's slot from the map unless another request or a dwell
    /// task still holds it. The next request starts from a fresh slot.
    async fn release_slot(&self, user_id: &str, slot: &Arc<Mutex<UserSlot>>) {
        let mut slots = self.slots.lock().await;
        let unused = slots
            .get(user_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot) && Arc::strong_count(slot) == 2);
        if unused {
            slots.remove(user_id);
        }
    }

    // ---- Topics -----------------------------------------------------------

    pub async fn teach_topic(
        &self,
        user_id: &str,
        name: &str,
        explanation_summary: &str,
    ) -> Result<(TopicRecord, bool), AppError> {
        let slot = self.slot(user_id).await;
        let _guard = slot.lock().await;
        let (record, created) = self.store.teach(user_id, name, explanation_summary).await?;
        if created {
            tracing::info!(user_id, topic = %record.name, "Topic taught");
        }
        Ok((record, created))
    }

    // ---- Standalone questions ---------------------------------------------

    /// Generates a question for a taught topic and keeps it as the pending
    /// question for `(topic, session_type)`, replacing any earlier one.
    pub async fn generate_question(
        &self,
        user_id: &str,
        topic: &str,
        session_type: SessionType,
        length: LengthTier,
    ) -> Result<PublicQuestion, AppError> {
        let record = self.store.get(user_id, topic).await?;
        let question = self.request_question(&record, session_type, length).await?;

        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;
        guard
            .pending
            .insert((name_key(&record.name), session_type), question.clone());

        Ok(question.public())
    }

    /// Scores an answer to the pending question and records the outcome.
    ///
    /// Validation and evaluation failures leave the pending question and the
    /// topic record untouched, so the caller can simply submit again.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        topic: &str,
        session_type: SessionType,
        answer: &str,
    ) -> Result<SubmissionResponse, AppError> {
        self.store.get(user_id, topic).await?;
        let key = (name_key(topic), session_type);
        let slot = self.slot(user_id).await;

        let question = {
            let guard = slot.lock().await;
            guard.pending.get(&key).cloned()
        }
        .ok_or_else(|| {
            AppError::StateTransition(format!(
                "No {} question is pending for '{}'. Generate one first.",
                session_type.as_str(),
                topic.trim()
            ))
        })?;

        let answer = screen_answer(&question, answer)?;
        let (result, outcome) = self.score(&question, &answer).await?;

        let mut guard = slot.lock().await;
        if guard.pending.get(&key).map(|q| q.id) != Some(question.id) {
            return Err(AppError::StateTransition(
                "This question was already answered or replaced".to_string(),
            ));
        }
        let record = self.store.update(user_id, &question.topic, outcome).await?;
        guard.pending.remove(&key);

        Ok(SubmissionResponse::new(&result, &record))
    }

    // ---- Profile ------------------------------------------------------------

    pub async fn get_topic_profile(&self, user_id: &str) -> Result<ProfileResponse, AppError> {
        let records = self.store.list(user_id).await?;
        let overall = (mastery::overall_mastery(&records) * 10_000.0).round() / 10_000.0;
        let knowledge_level = if records.iter().any(TopicRecord::is_assessed) {
            mastery::classify(overall, 1)
        } else {
            Classification::Unassessed
        };

        let names_with = |class: Classification| -> Vec<String> {
            records
                .iter()
                .filter(|r| r.classification == class)
                .map(|r| r.name.clone())
                .collect()
        };

        Ok(ProfileResponse {
            all_topics: records.iter().map(|r| r.name.clone()).collect(),
            weak_topics: names_with(Classification::Weak),
            strong_topics: names_with(Classification::Strong),
            overall_mastery: overall,
            mastery_display: format!("{}%", (overall * 100.0).round() as i64),
            knowledge_level,
        })
    }

    pub async fn list_topics(&self, user_id: &str) -> Result<TopicListResponse, AppError> {
        let records = self.store.list(user_id).await?;
        let entries_with = |class: Classification| -> Vec<TopicEntry> {
            records
                .iter()
                .filter(|r| r.classification == class)
                .map(TopicEntry::from)
                .collect()
        };

        Ok(TopicListResponse {
            all_topics: records.iter().map(TopicEntry::from).collect(),
            weak_topics: entries_with(Classification::Weak),
            strong_topics: entries_with(Classification::Strong),
        })
    }

    /// Weak areas, lowest mastery first, and strong areas, highest first.
    pub async fn areas(
        &self,
        user_id: &str,
        max_display: Option<usize>,
    ) -> Result<AreasResponse, AppError> {
        let records = self.store.list(user_id).await?;
        let max_display = max_display.unwrap_or(DEFAULT_MAX_DISPLAY);

        let mut weak: Vec<&TopicRecord> = records
            .iter()
            .filter(|r| r.classification == Classification::Weak)
            .collect();
        weak.sort_by(|a, b| a.mastery_score.total_cmp(&b.mastery_score));

        let mut strong: Vec<&TopicRecord> = records
            .iter()
            .filter(|r| r.classification == Classification::Strong)
            .collect();
        strong.sort_by(|a, b| b.mastery_score.total_cmp(&a.mastery_score));

        Ok(AreasResponse {
            weak: area_list(&weak, max_display),
            strong: area_list(&strong, max_display),
        })
    }

    /// Forgets every topic, pending question and session for the user.
    pub async fn reset_all(&self, user_id: &str) -> Result<u64, AppError> {
        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;
        let removed = self.store.reset(user_id).await?;
        guard.cancel_dwell();
        guard.pending.clear();
        guard.session = SessionState::Idle;
        drop(guard);
        self.release_slot(user_id, &slot).await;
        tracing::info!(user_id, removed, "Learner progress reset");
        Ok(removed)
    }

    // ---- Sessions -----------------------------------------------------------

    pub async fn session_view(&self, user_id: &str) -> SessionView {
        let slot = self.slot(user_id).await;
        let guard = slot.lock().await;
        guard.session.view()
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        session_type: SessionType,
    ) -> Result<SessionView, AppError> {
        if !self.store.has_topics(user_id).await? {
            return Err(AppError::StateTransition(
                "Teach at least one topic before starting an assessment".to_string(),
            ));
        }
        self.transition(user_id, SessionEvent::Begin { session_type }).await
    }

    /// Adds or removes a topic from the session scope.
    pub async fn select_topic(
        &self,
        user_id: &str,
        topic: &str,
        selected: bool,
    ) -> Result<SessionView, AppError> {
        let topic = if selected {
            self.store.get(user_id, topic).await?.name
        } else {
            topic.trim().to_string()
        };
        self.transition(user_id, SessionEvent::SelectTopic { topic, selected })
            .await
    }

    pub async fn confirm_scope(&self, user_id: &str) -> Result<SessionView, AppError> {
        self.transition(user_id, SessionEvent::ConfirmScope).await
    }

    pub async fn confirm_count(
        &self,
        user_id: &str,
        question_count: i64,
    ) -> Result<SessionView, AppError> {
        let view = self
            .transition(user_id, SessionEvent::ConfirmCount { question_count })
            .await?;
        tracing::info!(
            user_id,
            question_count,
            topics = ?view.selected_topics,
            "Assessment session started"
        );
        Ok(view)
    }

    /// Generates the question for the current index. Calling it again before
    /// answering replaces the question.
    pub async fn next_question(&self, user_id: &str) -> Result<SessionQuestionResponse, AppError> {
        let slot = self.slot(user_id).await;

        let (index, topic, session_type) = {
            let guard = slot.lock().await;
            let active = guard.session.active().ok_or_else(|| {
                AppError::StateTransition(format!(
                    "Cannot request a question while the session is {}",
                    guard.session.name()
                ))
            })?;
            if !matches!(active.phase, Phase::AwaitingQuestion | Phase::Answering { .. }) {
                return Err(AppError::StateTransition(
                    "The current question has already been answered".to_string(),
                ));
            }
            (
                active.current_index,
                active.current_topic().to_string(),
                active.session_type,
            )
        };

        let record = self.store.get(user_id, &topic).await?;
        let question = self
            .request_question(&record, session_type, LengthTier::default())
            .await?;

        let mut guard = slot.lock().await;
        guard.session.apply(SessionEvent::QuestionReady {
            index,
            question: question.clone(),
        })?;

        Ok(SessionQuestionResponse {
            question: question.public(),
            session: guard.session.view(),
        })
    }

    /// Scores the answer to the current session question.
    ///
    /// On success the mastery update is committed, the score accumulates and
    /// the explanation gate opens after the dwell time.
    pub async fn submit_session_answer(
        &self,
        user_id: &str,
        answer: &str,
    ) -> Result<SessionAnswerResponse, AppError> {
        let slot = self.slot(user_id).await;
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);

        let (question, answer) = {
            let mut guard = slot.lock().await;
            let question = guard.session.answering()?.clone();
            let answer = screen_answer(&question, answer)?;
            guard.session.apply(SessionEvent::BeginScoring { ticket })?;
            (question, answer)
        };

        let scored = self.score(&question, &answer).await;

        let mut guard = slot.lock().await;
        let (result, outcome) = match scored {
            Ok(scored) => scored,
            Err(e) => {
                // No-op if the session was cancelled meanwhile.
                let _ = guard.session.apply(SessionEvent::ScoringFailed { ticket });
                return Err(e);
            }
        };

        if !guard.session.is_scoring(ticket) {
            tracing::info!(user_id, "Discarding a result for a cancelled session question");
            return Err(AppError::StateTransition(
                "The session ended before the answer was scored".to_string(),
            ));
        }

        let record = match self.store.update(user_id, &question.topic, outcome).await {
            Ok(record) => record,
            Err(e) => {
                let _ = guard.session.apply(SessionEvent::ScoringFailed { ticket });
                return Err(e);
            }
        };

        guard.session.apply(SessionEvent::Scored {
            ticket,
            points: result.points(),
            explanation_shown: result.has_explanation(),
        })?;
        guard.cancel_dwell();
        guard.dwell_task = Some(self.schedule_dwell(Arc::clone(&slot), ticket));

        Ok(SessionAnswerResponse {
            evaluation: SubmissionResponse::new(&result, &record),
            session: guard.session.view(),
        })
    }

    pub async fn advance(&self, user_id: &str) -> Result<SessionView, AppError> {
        let view = self.transition(user_id, SessionEvent::Advance).await?;
        if let Some(summary) = &view.summary {
            tracing::info!(
                user_id,
                score = summary.score,
                max_score = summary.max_score,
                "Assessment session complete"
            );
        }
        Ok(view)
    }

    pub async fn cancel(&self, user_id: &str) -> Result<SessionView, AppError> {
        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;
        let already_cancelled = guard.session == SessionState::Cancelled;
        guard.session.apply(SessionEvent::Cancel)?;
        guard.cancel_dwell();
        if !already_cancelled {
            tracing::info!(user_id, "Assessment session cancelled");
        }
        Ok(guard.session.view())
    }

    pub async fn dismiss(&self, user_id: &str) -> Result<SessionView, AppError> {
        self.transition(user_id, SessionEvent::Dismiss).await
    }

    async fn transition(&self, user_id: &str, event: SessionEvent) -> Result<SessionView, AppError> {
        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;
        guard.session.apply(event)?;
        Ok(guard.session.view())
    }

    /// Opens the explanation gate for `ticket` once the dwell time has passed.
    fn schedule_dwell(&self, slot: Arc<Mutex<UserSlot>>, ticket: u64) -> AbortHandle {
        let dwell = self.dwell;
        tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            let mut guard = slot.lock().await;
            match guard.session.apply(SessionEvent::DwellElapsed { ticket }) {
                Ok(()) => guard.dwell_task = None,
                Err(e) => tracing::debug!("Dwell elapsed for a stale question: {}", e),
            }
        })
        .abort_handle()
    }

    // ---- Collaborators ------------------------------------------------------

    async fn request_question(
        &self,
        record: &TopicRecord,
        session_type: SessionType,
        length: LengthTier,
    ) -> Result<Question, AppError> {
        let request = QuestionRequest {
            topic: record.name.clone(),
            session_type,
            difficulty: Difficulty::from_mastery(record.mastery_score),
            length,
            explanation_summary: record.explanation_summary.clone(),
        };

        let question = self.generator.generate(&request).await?;
        question.check_shape(session_type).map_err(|e| {
            tracing::warn!(topic = %record.name, "Generator returned a malformed question: {}", e);
            AppError::Generation(e)
        })?;

        tracing::debug!(
            topic = %record.name,
            session_type = session_type.as_str(),
            difficulty = request.difficulty.as_str(),
            "Question generated"
        );
        Ok(question)
    }

    /// Runs the scorer and turns its output into a trusted outcome.
    async fn score(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<(EvaluationResult, Outcome), AppError> {
        let mut result = self.scorer.evaluate(question, answer).await?;

        if result.evaluation_error {
            tracing::warn!(topic = %question.topic, "Scorer reported an evaluation error");
            return Err(AppError::Evaluation(
                "Your answer could not be evaluated. Please submit it again.".to_string(),
            ));
        }

        if let QuestionBody::Mcq { explanation, .. } = &question.body {
            if result.explanation.trim().is_empty() {
                result.explanation = explanation.clone();
            }
        }
        if !result.has_explanation() {
            tracing::warn!(topic = %question.topic, "Scorer returned no feedback or explanation");
            return Err(AppError::Evaluation(
                "The evaluation came back without an explanation. Please submit again.".to_string(),
            ));
        }

        let outcome = match (&question.body, &mut result.detail) {
            (QuestionBody::Mcq { correct_label, .. }, EvaluationDetail::Mcq { is_correct }) => {
                let matched = labels_match(answer, correct_label);
                if *is_correct != matched {
                    tracing::debug!(topic = %question.topic, "Overriding scorer verdict with label match");
                }
                *is_correct = matched;
                Outcome::Mcq { is_correct: matched }
            }
            (QuestionBody::Qna { .. }, EvaluationDetail::Qna { rubric, result: verdict, .. }) => {
                rubric.check().map_err(|e| {
                    tracing::warn!(topic = %question.topic, "Inconsistent rubric: {}", e);
                    AppError::Evaluation(
                        "The evaluation was inconsistent. Please submit again.".to_string(),
                    )
                })?;
                Outcome::Qna {
                    total_marks: rubric.total_marks,
                    is_correct: *verdict == Verdict::Correct,
                }
            }
            _ => {
                tracing::warn!(topic = %question.topic, "Scorer answered for the wrong question type");
                return Err(AppError::Evaluation(
                    "The evaluation did not match the question. Please submit again.".to_string(),
                ));
            }
        };

        Ok((result, outcome))
    }
}

/// Pre-scoring checks. MCQ answers must name one of the options; free-form
/// answers must pass the validator. Returns the answer to send to the scorer.
fn screen_answer(question: &Question, answer: &str) -> Result<String, AppError> {
    match &question.body {
        QuestionBody::Mcq { .. } => question
            .find_option(answer)
            .map(|option| option.label.clone())
            .ok_or_else(|| {
                AppError::Validation("Select exactly one of the listed options.".to_string())
            }),
        QuestionBody::Qna { .. } => {
            validator::check(answer)
                .map_err(|reason| AppError::Validation(reason.message().to_string()))?;
            Ok(answer.trim().to_string())
        }
    }
}

fn labels_match(selected: &str, correct: &str) -> bool {
    selected.trim().eq_ignore_ascii_case(correct.trim())
}

fn area_list(records: &[&TopicRecord], max_display: usize) -> AreaList {
    AreaList {
        areas: records
            .iter()
            .take(max_display)
            .map(|r| AreaEntry {
                name: r.name.clone(),
                mastery_pct: r.mastery_pct(),
                last_assessed: r.last_assessed,
            })
            .collect(),
        more_count: records.len().saturating_sub(max_display),
    }
}

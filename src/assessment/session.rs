// src/assessment/session.rs

//! Assessment session controller.
//!
//! A session moves `idle → scope → count → active → {complete | cancelled}`.
//! Every change goes through [`SessionState::apply`], which either yields the
//! next state or rejects the event and leaves the current state untouched.
//! Inside `active`, each question cycles through
//! `awaiting_question → answering → scoring → reviewing`.

use crate::{
    error::AppError,
    models::{
        question::{Question, SessionType},
        session::{SessionSummary, SessionView},
    },
};

pub const MIN_QUESTIONS: i64 = 1;
pub const MAX_QUESTIONS: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDraft {
    pub session_type: SessionType,
    /// Insertion-ordered, no duplicates.
    pub selected_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// No question has been generated for the current index yet.
    AwaitingQuestion,
    /// Question served; waiting for the one submission this index accepts.
    Answering { question: Question },
    /// Submission handed to the scorer under `ticket`.
    Scoring { question: Question, ticket: u64 },
    /// Scored. `can_advance` flips once the explanation dwell has elapsed.
    Reviewing {
        ticket: u64,
        explanation_shown: bool,
        can_advance: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session_type: SessionType,
    pub selected_topics: Vec<String>,
    pub question_count: u32,
    pub current_index: u32,
    pub score_accumulator: u32,
    pub phase: Phase,
}

impl ActiveSession {
    /// Round-robin topic assignment for the current index.
    pub fn current_topic(&self) -> &str {
        let slot = self.current_index as usize % self.selected_topics.len();
        &self.selected_topics[slot]
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_type: self.session_type,
            question_count: self.question_count,
            score: self.score_accumulator,
            max_score: self.question_count * self.session_type.max_points(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scope(ScopeDraft),
    Count(ScopeDraft),
    Active(ActiveSession),
    Complete(SessionSummary),
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Begin { session_type: SessionType },
    SelectTopic { topic: String, selected: bool },
    ConfirmScope,
    ConfirmCount { question_count: i64 },
    QuestionReady { index: u32, question: Question },
    BeginScoring { ticket: u64 },
    ScoringFailed { ticket: u64 },
    Scored { ticket: u64, points: u32, explanation_shown: bool },
    DwellElapsed { ticket: u64 },
    Advance,
    Cancel,
    Dismiss,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Begin { .. } => "start",
            SessionEvent::SelectTopic { .. } => "select_topic",
            SessionEvent::ConfirmScope => "confirm_scope",
            SessionEvent::ConfirmCount { .. } => "confirm_count",
            SessionEvent::QuestionReady { .. } => "question_ready",
            SessionEvent::BeginScoring { .. } => "submit_answer",
            SessionEvent::ScoringFailed { .. } => "scoring_failed",
            SessionEvent::Scored { .. } => "scored",
            SessionEvent::DwellElapsed { .. } => "dwell_elapsed",
            SessionEvent::Advance => "advance",
            SessionEvent::Cancel => "cancel",
            SessionEvent::Dismiss => "dismiss",
        }
    }
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Scope(_) => "scope",
            SessionState::Count(_) => "count",
            SessionState::Active(_) => "active",
            SessionState::Complete(_) => "complete",
            SessionState::Cancelled => "cancelled",
        }
    }

    /// Applies `event`. On error the state is left exactly as it was.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), AppError> {
        let next = self.next(event)?;
        *self = next;
        Ok(())
    }

    /// The transition table.
    pub fn next(&self, event: SessionEvent) -> Result<SessionState, AppError> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Idle, E::Begin { session_type }) => Ok(S::Scope(ScopeDraft {
                session_type,
                selected_topics: Vec::new(),
            })),

            (S::Scope(draft), E::SelectTopic { topic, selected }) => {
                let mut draft = draft.clone();
                let existing = draft
                    .selected_topics
                    .iter()
                    .position(|t| t.eq_ignore_ascii_case(&topic));
                match (existing, selected) {
                    (None, true) => draft.selected_topics.push(topic),
                    (Some(i), false) => {
                        draft.selected_topics.remove(i);
                    }
                    _ => {}
                }
                Ok(S::Scope(draft))
            }

            (S::Scope(draft), E::ConfirmScope) => {
                if draft.selected_topics.is_empty() {
                    return Err(AppError::StateTransition(
                        "Select at least one topic before confirming the scope".to_string(),
                    ));
                }
                Ok(S::Count(draft.clone()))
            }

            (S::Count(draft), E::ConfirmCount { question_count }) => {
                if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&question_count) {
                    return Err(AppError::Validation(format!(
                        "Question count must be between {} and {}, got {}",
                        MIN_QUESTIONS, MAX_QUESTIONS, question_count
                    )));
                }
                Ok(S::Active(ActiveSession {
                    session_type: draft.session_type,
                    selected_topics: draft.selected_topics.clone(),
                    question_count: question_count as u32,
                    current_index: 0,
                    score_accumulator: 0,
                    phase: Phase::AwaitingQuestion,
                }))
            }

            (S::Active(active), E::QuestionReady { index, question }) => {
                let ready = matches!(active.phase, Phase::AwaitingQuestion | Phase::Answering { .. });
                if !ready || index != active.current_index {
                    return Err(AppError::StateTransition(
                        "Session is not waiting for a question at this index".to_string(),
                    ));
                }
                if question.session_type() != active.session_type {
                    return Err(AppError::Generation(format!(
                        "Expected a {} question for this session",
                        active.session_type.as_str()
                    )));
                }
                Ok(S::Active(ActiveSession {
                    phase: Phase::Answering { question },
                    ..active.clone()
                }))
            }

            (S::Active(active), E::BeginScoring { ticket }) => match &active.phase {
                Phase::Answering { question } => Ok(S::Active(ActiveSession {
                    phase: Phase::Scoring { question: question.clone(), ticket },
                    ..active.clone()
                })),
                Phase::AwaitingQuestion => Err(AppError::StateTransition(
                    "No question has been served at this index".to_string(),
                )),
                Phase::Scoring { .. } => Err(AppError::StateTransition(
                    "An answer for this question is already being scored".to_string(),
                )),
                Phase::Reviewing { .. } => Err(AppError::StateTransition(
                    "This question has already been answered".to_string(),
                )),
            },

            (S::Active(active), E::ScoringFailed { ticket }) => match &active.phase {
                Phase::Scoring { question, ticket: current } if *current == ticket => {
                    Ok(S::Active(ActiveSession {
                        phase: Phase::Answering { question: question.clone() },
                        ..active.clone()
                    }))
                }
                _ => Err(stale_ticket()),
            },

            (S::Active(active), E::Scored { ticket, points, explanation_shown }) => {
                match &active.phase {
                    Phase::Scoring { ticket: current, .. } if *current == ticket => {
                        Ok(S::Active(ActiveSession {
                            score_accumulator: active.score_accumulator + points,
                            phase: Phase::Reviewing {
                                ticket,
                                explanation_shown,
                                can_advance: false,
                            },
                            ..active.clone()
                        }))
                    }
                    _ => Err(stale_ticket()),
                }
            }

            (S::Active(active), E::DwellElapsed { ticket }) => match &active.phase {
                Phase::Reviewing { ticket: current, explanation_shown: true, .. }
                    if *current == ticket =>
                {
                    Ok(S::Active(ActiveSession {
                        phase: Phase::Reviewing {
                            ticket,
                            explanation_shown: true,
                            can_advance: true,
                        },
                        ..active.clone()
                    }))
                }
                _ => Err(stale_ticket()),
            },

            (S::Active(active), E::Advance) => match &active.phase {
                Phase::Reviewing { can_advance: true, .. } => {
                    let next_index = active.current_index + 1;
                    if next_index >= active.question_count {
                        Ok(S::Complete(active.summary()))
                    } else {
                        Ok(S::Active(ActiveSession {
                            current_index: next_index,
                            phase: Phase::AwaitingQuestion,
                            ..active.clone()
                        }))
                    }
                }
                Phase::Reviewing { .. } => Err(AppError::StateTransition(
                    "Read the explanation before moving on".to_string(),
                )),
                _ => Err(AppError::StateTransition(
                    "The current question has not been scored yet".to_string(),
                )),
            },

            (S::Scope(_) | S::Count(_) | S::Active(_) | S::Cancelled, E::Cancel) => {
                Ok(S::Cancelled)
            }

            (S::Complete(_) | S::Cancelled, E::Dismiss) => Ok(S::Idle),

            (state, event) => Err(AppError::StateTransition(format!(
                "Cannot {} while the session is {}",
                event.name(),
                state.name()
            ))),
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Active(active) => Some(active),
            _ => None,
        }
    }

    /// The question currently open for an answer.
    pub fn answering(&self) -> Result<&Question, AppError> {
        match self {
            SessionState::Active(ActiveSession {
                phase: Phase::Answering { question },
                ..
            }) => Ok(question),
            SessionState::Active(_) => Err(AppError::StateTransition(
                "No question is awaiting an answer".to_string(),
            )),
            other => Err(AppError::StateTransition(format!(
                "Cannot submit_answer while the session is {}",
                other.name()
            ))),
        }
    }

    /// Whether a submission is in flight under `ticket`.
    pub fn is_scoring(&self, ticket: u64) -> bool {
        matches!(
            self.active().map(|a| &a.phase),
            Some(Phase::Scoring { ticket: current, .. }) if *current == ticket
        )
    }

    pub fn view(&self) -> SessionView {
        let mut view = SessionView {
            state: self.name(),
            phase: None,
            session_type: None,
            selected_topics: Vec::new(),
            question_count: None,
            current_index: None,
            current_topic: None,
            explanation_shown: false,
            can_advance: false,
            score: 0,
            summary: None,
        };
        match self {
            SessionState::Idle | SessionState::Cancelled => {}
            SessionState::Scope(draft) | SessionState::Count(draft) => {
                view.session_type = Some(draft.session_type);
                view.selected_topics = draft.selected_topics.clone();
            }
            SessionState::Active(active) => {
                view.session_type = Some(active.session_type);
                view.selected_topics = active.selected_topics.clone();
                view.question_count = Some(active.question_count);
                view.current_index = Some(active.current_index);
                view.current_topic = Some(active.current_topic().to_string());
                view.score = active.score_accumulator;
                let phase = match &active.phase {
                    Phase::AwaitingQuestion => "awaiting_question",
                    Phase::Answering { .. } => "answering",
                    Phase::Scoring { .. } => "scoring",
                    Phase::Reviewing { explanation_shown, can_advance, .. } => {
                        view.explanation_shown = *explanation_shown;
                        view.can_advance = *can_advance;
                        "reviewing"
                    }
                };
                view.phase = Some(phase);
            }
            SessionState::Complete(summary) => {
                view.session_type = Some(summary.session_type);
                view.question_count = Some(summary.question_count);
                view.score = summary.score;
                view.summary = Some(summary.clone());
            }
        }
        view
    }
}

fn stale_ticket() -> AppError {
    AppError::StateTransition("The answer being scored is no longer current".to_string())
}

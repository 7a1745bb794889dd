// src/models/topic.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

static TOPIC_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9 \-&]+$").expect("topic name pattern is valid"));

/// Discrete mastery label derived from the mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Unassessed,
    Weak,
    Strong,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unassessed => "unassessed",
            Classification::Weak => "weak",
            Classification::Strong => "strong",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unassessed" => Some(Classification::Unassessed),
            "weak" => Some(Classification::Weak),
            "strong" => Some(Classification::Strong),
            _ => None,
        }
    }
}

/// Mastery state of one taught topic for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    /// Display name, as first taught. Lookups are case-insensitive.
    pub name: String,

    /// What was covered when the topic was taught. Assessment never touches it.
    pub explanation_summary: String,

    /// Confidence in [0, 1], derived only from assessed questions.
    pub mastery_score: f64,

    pub questions_attempted: i64,

    /// Never exceeds `questions_attempted`.
    pub correct_answers: i64,

    pub classification: Classification,

    pub last_assessed: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl TopicRecord {
    pub fn mastery_pct(&self) -> i64 {
        (self.mastery_score * 100.0).round() as i64
    }

    pub fn is_assessed(&self) -> bool {
        self.questions_attempted > 0
    }
}

/// Raw `topic_records` row.
#[derive(Debug, FromRow)]
pub struct TopicRow {
    pub name: String,
    pub explanation_summary: String,
    pub mastery_score: f64,
    pub questions_attempted: i64,
    pub correct_answers: i64,
    pub classification: String,
    pub last_assessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TopicRow> for TopicRecord {
    type Error = String;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        let classification = Classification::parse(&row.classification)
            .ok_or_else(|| format!("Unknown classification '{}'", row.classification))?;
        Ok(TopicRecord {
            name: row.name,
            explanation_summary: row.explanation_summary,
            mastery_score: row.mastery_score,
            questions_attempted: row.questions_attempted,
            correct_answers: row.correct_answers,
            classification,
            last_assessed: row.last_assessed,
            created_at: row.created_at,
        })
    }
}

/// DTO for registering a freshly taught topic.
#[derive(Debug, Deserialize, Validate)]
pub struct TeachTopicRequest {
    #[validate(custom(function = validate_topic_name))]
    pub name: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub explanation_summary: String,
}

pub fn validate_topic_name(name: &str) -> Result<(), validator::ValidationError> {
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return Err(validator::ValidationError::new("topic_name_length")
            .with_message("Topic name must be between 3 and 50 characters.".into()));
    }
    if !TOPIC_NAME_RE.is_match(name) {
        return Err(validator::ValidationError::new("topic_name_charset")
            .with_message("Topic name contains invalid characters.".into()));
    }
    Ok(())
}

/// One topic as shown in topic listings.
#[derive(Debug, Serialize)]
pub struct TopicEntry {
    pub name: String,
    pub mastery_score: f64,
    pub mastery_pct: i64,
    pub questions_attempted: i64,
    pub correct_answers: i64,
    pub classification: Classification,
    pub explanation_summary: String,
    pub last_assessed: Option<DateTime<Utc>>,
}

impl From<&TopicRecord> for TopicEntry {
    fn from(record: &TopicRecord) -> Self {
        TopicEntry {
            name: record.name.clone(),
            mastery_score: record.mastery_score,
            mastery_pct: record.mastery_pct(),
            questions_attempted: record.questions_attempted,
            correct_answers: record.correct_answers,
            classification: record.classification,
            explanation_summary: record.explanation_summary.clone(),
            last_assessed: record.last_assessed,
        }
    }
}

/// Topics grouped by classification.
#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub all_topics: Vec<TopicEntry>,
    pub weak_topics: Vec<TopicEntry>,
    pub strong_topics: Vec<TopicEntry>,
}

/// Learner profile consumed by the tutoring layer.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub all_topics: Vec<String>,
    pub weak_topics: Vec<String>,
    pub strong_topics: Vec<String>,
    pub overall_mastery: f64,
    pub mastery_display: String,
    pub knowledge_level: Classification,
}

#[derive(Debug, Deserialize)]
pub struct AreasParams {
    pub max_display: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AreaEntry {
    pub name: String,
    pub mastery_pct: i64,
    pub last_assessed: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AreaList {
    pub areas: Vec<AreaEntry>,
    pub more_count: usize,
}

/// Weak areas (lowest mastery first) and strong areas (highest first).
#[derive(Debug, Serialize)]
pub struct AreasResponse {
    pub weak: AreaList,
    pub strong: AreaList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_name_rules() {
        assert!(validate_topic_name("Photosynthesis").is_ok());
        assert!(validate_topic_name("Rock & Roll - 101").is_ok());
        assert!(validate_topic_name("ab").is_err());
        assert!(validate_topic_name(&"x".repeat(51)).is_err());
        assert!(validate_topic_name("Cells; DROP").is_err());
    }

    #[test]
    fn test_mastery_pct_rounds() {
        let record = TopicRecord {
            name: "Osmosis".into(),
            explanation_summary: String::new(),
            mastery_score: 0.666_666,
            questions_attempted: 3,
            correct_answers: 2,
            classification: Classification::Strong,
            last_assessed: None,
            created_at: Utc::now(),
        };
        assert_eq!(record.mastery_pct(), 67);
    }
}

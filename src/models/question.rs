// src/models/question.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Assessment flavour: multiple-choice or free-form question and answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "MCQ", alias = "mcq")]
    Mcq,
    #[serde(rename = "QNA", alias = "qna")]
    Qna,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Mcq => "MCQ",
            SessionType::Qna => "QNA",
        }
    }

    /// Highest score a single question of this type can contribute.
    pub fn max_points(&self) -> u32 {
        match self {
            SessionType::Mcq => 1,
            SessionType::Qna => 10,
        }
    }
}

/// Expected length of a free-form answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthTier {
    Short,
    #[default]
    Medium,
    Long,
}

/// Difficulty requested from the question generator, derived from mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Developing,
    Proficient,
    Mastery,
}

impl Difficulty {
    pub fn from_mastery(mastery: f64) -> Self {
        if mastery >= 0.9 {
            Difficulty::Mastery
        } else if mastery >= 0.7 {
            Difficulty::Proficient
        } else if mastery >= 0.4 {
            Difficulty::Developing
        } else {
            Difficulty::Beginner
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Developing => "developing",
            Difficulty::Proficient => "proficient",
            Difficulty::Mastery => "mastery",
        }
    }
}

/// One labelled choice, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOption {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionBody {
    Mcq {
        options: Vec<McqOption>,
        /// Server-side only.
        correct_label: String,
        /// Server-side only.
        explanation: String,
    },
    Qna {
        length: LengthTier,
    },
}

/// A generated question, including the parts never sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub topic: String,
    pub stem: String,
    pub difficulty: Difficulty,
    pub body: QuestionBody,
}

impl Question {
    pub fn session_type(&self) -> SessionType {
        match self.body {
            QuestionBody::Mcq { .. } => SessionType::Mcq,
            QuestionBody::Qna { .. } => SessionType::Qna,
        }
    }

    /// Looks up an option label, ignoring case and surrounding whitespace.
    pub fn find_option(&self, selected: &str) -> Option<&McqOption> {
        let selected = selected.trim();
        match &self.body {
            QuestionBody::Mcq { options, .. } => options
                .iter()
                .find(|o| o.label.eq_ignore_ascii_case(selected)),
            QuestionBody::Qna { .. } => None,
        }
    }

    /// Structural checks on generator output.
    pub fn check_shape(&self, expected: SessionType) -> Result<(), String> {
        if self.session_type() != expected {
            return Err(format!(
                "Expected a {} question, generator returned {}",
                expected.as_str(),
                self.session_type().as_str()
            ));
        }
        if self.stem.trim().is_empty() {
            return Err("Generated question has an empty stem".to_string());
        }
        if let QuestionBody::Mcq { options, correct_label, .. } = &self.body {
            if options.len() < 2 {
                return Err("Generated question has fewer than two options".to_string());
            }
            for (i, option) in options.iter().enumerate() {
                if option.label.trim().is_empty() {
                    return Err("Generated question has an unlabelled option".to_string());
                }
                if options[..i]
                    .iter()
                    .any(|o| o.label.eq_ignore_ascii_case(&option.label))
                {
                    return Err(format!("Duplicate option label '{}'", option.label));
                }
            }
            if self.find_option(correct_label).is_none() {
                return Err(format!(
                    "Correct label '{}' is not among the options",
                    correct_label
                ));
            }
        }
        Ok(())
    }

    /// Client-facing view without the answer key or explanation.
    pub fn public(&self) -> PublicQuestion {
        let (options, length) = match &self.body {
            QuestionBody::Mcq { options, .. } => (Some(options.clone()), None),
            QuestionBody::Qna { length } => (None, Some(*length)),
        };
        PublicQuestion {
            id: self.id,
            topic: self.topic.clone(),
            session_type: self.session_type(),
            stem: self.stem.clone(),
            options,
            length,
            difficulty: self.difficulty,
        }
    }
}

/// DTO for sending a question to the client (excludes answer and explanation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub topic: String,
    pub session_type: SessionType,
    pub stem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<McqOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthTier>,
    pub difficulty: Difficulty,
}

/// What the engine asks the question generator for.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub topic: String,
    pub session_type: SessionType,
    pub difficulty: Difficulty,
    pub length: LengthTier,
    pub explanation_summary: String,
}

/// DTO for requesting a standalone question.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuestionRequest {
    #[validate(length(min = 1, max = 50))]
    pub topic: String,
    pub session_type: SessionType,
    pub length: Option<LengthTier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(labels: &[&str], correct: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            topic: "Photosynthesis".into(),
            stem: "Where does photosynthesis happen?".into(),
            difficulty: Difficulty::Beginner,
            body: QuestionBody::Mcq {
                options: labels
                    .iter()
                    .map(|l| McqOption { label: l.to_string(), text: format!("option {}", l) })
                    .collect(),
                correct_label: correct.into(),
                explanation: "Chloroplasts.".into(),
            },
        }
    }

    #[test]
    fn test_difficulty_tiers() {
        assert_eq!(Difficulty::from_mastery(0.0), Difficulty::Beginner);
        assert_eq!(Difficulty::from_mastery(0.4), Difficulty::Developing);
        assert_eq!(Difficulty::from_mastery(0.75), Difficulty::Proficient);
        assert_eq!(Difficulty::from_mastery(0.9), Difficulty::Mastery);
    }

    #[test]
    fn test_shape_rejects_duplicate_labels() {
        let q = mcq(&["A", "a", "C"], "A");
        assert!(q.check_shape(SessionType::Mcq).is_err());
    }

    #[test]
    fn test_shape_rejects_missing_correct_label() {
        let q = mcq(&["A", "B", "C", "D"], "E");
        assert!(q.check_shape(SessionType::Mcq).is_err());
        assert!(mcq(&["A", "B"], "b").check_shape(SessionType::Mcq).is_ok());
    }

    #[test]
    fn test_shape_rejects_wrong_type() {
        let q = mcq(&["A", "B"], "A");
        assert!(q.check_shape(SessionType::Qna).is_err());
    }

    #[test]
    fn test_public_view_hides_answer_key() {
        let q = mcq(&["A", "B", "C", "D"], "C");
        let json = serde_json::to_value(q.public()).unwrap();
        assert!(json.get("correct_label").is_none());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["options"][2]["label"], "C");
        assert_eq!(json["session_type"], "MCQ");
    }

    #[test]
    fn test_find_option_is_case_insensitive() {
        let q = mcq(&["A", "B"], "A");
        assert!(q.find_option(" b ").is_some());
        assert!(q.find_option("A,B").is_none());
    }
}

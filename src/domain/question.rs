//! Follow-up question types

use serde::{Deserialize, Serialize};

/// How the question is answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Text,
    Single,
    Multiple,
}

/// Which exploration dimension a question belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    /// Learning preferences and style
    Preference,
    /// Prior experience and transferable skills
    Foundation,
    /// Quality standards and trade-offs
    Priority,
}

/// One follow-up question produced by the question agent
///
/// Deserialization is deliberately lenient: the model frequently omits
/// `options` or `category`, and both are recoverable downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    pub id: String,

    pub question: String,

    #[serde(rename = "type", default)]
    pub kind: QuestionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<QuestionCategory>,
}

impl FollowUpQuestion {
    pub fn new(id: impl Into<String>, question: impl Into<String>, kind: QuestionType) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            kind,
            options: None,
            category: None,
        }
    }
}

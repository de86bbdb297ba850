//! Goal profile - the immutable input to one pipeline run

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Self-rated experience level from the intake form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

impl ExperienceLevel {
    /// Human-readable label used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "初学者",
            ExperienceLevel::Intermediate => "进阶者",
            ExperienceLevel::Expert => "精通者",
        }
    }
}

/// Everything the user told us about their goal
///
/// Created once per pipeline invocation and never mutated. Free-text fields
/// are passed through to prompts verbatim; `daily_hours` is kept as the raw
/// string the form submitted and parsed leniently on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalProfile {
    /// Free-text goal description
    pub goal: String,

    /// Optional hard deadline
    pub deadline: Option<NaiveDate>,

    /// Self-rated experience
    pub experience: ExperienceLevel,

    /// Importance 1-5
    pub importance: u8,

    /// Daily available hours, free-form ("2", "2小时", "1.5")
    pub daily_hours: String,

    /// Weekday labels the user plans to work on
    pub working_days: Vec<String>,

    /// Known blockers, free text
    pub blockers: String,

    /// Resources already available, free text
    pub resources: String,

    /// What the user hopes to get out of this
    pub expectations: Vec<String>,
}

impl GoalProfile {
    /// Parse `daily_hours` leniently, defaulting to 2.0
    pub fn daily_hours_value(&self) -> f64 {
        self.daily_hours
            .trim()
            .trim_end_matches("小时")
            .trim()
            .parse()
            .unwrap_or(2.0)
    }

    /// Days between `today` and the deadline, if one is set
    pub fn days_until_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|d| (d - today).num_days())
    }
}

/// An answer to a follow-up question: free text or selected choices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Choices(choices) => choices.is_empty(),
        }
    }

    /// Flatten to a single line for prompt embedding
    pub fn summary(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Choices(choices) => choices.join(", "),
        }
    }
}

/// Question-id to answer mapping accumulated across rounds
pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Merge a new round of answers into the accumulated set
///
/// New answers override prior answers for the same question id.
pub fn merge_answers(prior: &AnswerMap, new: &AnswerMap) -> AnswerMap {
    debug!(prior_count = prior.len(), new_count = new.len(), "merge_answers: called");
    let mut merged = prior.clone();
    for (key, value) in new {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_hours_lenient_parsing() {
        let mut profile = GoalProfile {
            daily_hours: "2".to_string(),
            ..Default::default()
        };
        assert_eq!(profile.daily_hours_value(), 2.0);

        profile.daily_hours = " 1.5小时 ".to_string();
        assert_eq!(profile.daily_hours_value(), 1.5);

        profile.daily_hours = "看情况".to_string();
        assert_eq!(profile.daily_hours_value(), 2.0);
    }

    #[test]
    fn test_days_until_deadline() {
        let profile = GoalProfile {
            deadline: Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(profile.days_until_deadline(today), Some(28));

        let profile = GoalProfile::default();
        assert_eq!(profile.days_until_deadline(today), None);
    }

    #[test]
    fn test_merge_answers_new_overrides_prior() {
        let mut prior = AnswerMap::new();
        prior.insert("q1".to_string(), AnswerValue::Text("旧答案".to_string()));
        prior.insert("q2".to_string(), AnswerValue::Text("保留".to_string()));

        let mut new = AnswerMap::new();
        new.insert("q1".to_string(), AnswerValue::Text("新答案".to_string()));
        new.insert("q3".to_string(), AnswerValue::Choices(vec!["a".to_string()]));

        let merged = merge_answers(&prior, &new);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["q1"].summary(), "新答案");
        assert_eq!(merged["q2"].summary(), "保留");
    }

    #[test]
    fn test_profile_deserialize_with_defaults() {
        let json = r#"{"goal": "学习网页开发", "daily_hours": "2"}"#;
        let profile: GoalProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.goal, "学习网页开发");
        assert_eq!(profile.experience, ExperienceLevel::Beginner);
        assert!(profile.deadline.is_none());
    }

    #[test]
    fn test_answer_value_untagged() {
        let text: AnswerValue = serde_json::from_str(r#""每天2小时""#).unwrap();
        assert_eq!(text.summary(), "每天2小时");

        let choices: AnswerValue = serde_json::from_str(r#"["选项1", "选项2"]"#).unwrap();
        assert_eq!(choices.summary(), "选项1, 选项2");
    }
}

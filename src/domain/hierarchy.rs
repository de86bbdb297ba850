//! Canonical task hierarchy and pipeline result types
//!
//! All agent output shapes are normalized into the fixed five-bucket
//! hierarchy defined here. Maps are insertion-ordered because the period
//! labels ("第1周", "11月3日") are meaningful only in the order the plan
//! was laid out.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::FollowUpQuestion;

/// How many period labels the condensed summary quotes per level
const SUMMARY_MONTHLY_LIMIT: usize = 6;
const SUMMARY_WEEKLY_LIMIT: usize = 8;
const SUMMARY_DAILY_WEEKS: usize = 4;

/// One unit of work at any level of the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskNode {
    /// Unique within its level (m1-1, w2-3, d-第1周-Day2)
    pub id: String,

    pub title: String,

    pub description: String,

    /// "产出：..." statement, when the agent provided one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// The five-bucket plan: yearly down to per-day tasks
///
/// Constructed fresh on every generation or regeneration; a new hierarchy
/// always fully replaces the old one in the caller's storage. The daily
/// bucket is keyed by a composite "第M个月-第N周" label so it nests under
/// the matching weekly and monthly buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskHierarchy {
    pub yearly: Vec<TaskNode>,
    pub quarterly: IndexMap<String, Vec<TaskNode>>,
    pub monthly: IndexMap<String, Vec<TaskNode>>,
    pub weekly: IndexMap<String, Vec<TaskNode>>,
    pub daily: IndexMap<String, IndexMap<String, Vec<TaskNode>>>,
}

impl TaskHierarchy {
    /// True when every bucket is empty - never a valid plan
    pub fn is_empty(&self) -> bool {
        self.yearly.is_empty()
            && self.quarterly.is_empty()
            && self.monthly.is_empty()
            && self.weekly.is_empty()
            && self.daily.is_empty()
    }

    /// Condensed textual summary for regeneration prompts
    ///
    /// Quotes the first few monthly/weekly labels with their lead task title
    /// and day counts per daily week, not the full hierarchy.
    pub fn condensed_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push("月度任务:".to_string());
        if self.monthly.is_empty() {
            lines.push("- 无".to_string());
        }
        for (label, tasks) in self.monthly.iter().take(SUMMARY_MONTHLY_LIMIT) {
            let title = tasks.first().map(|t| t.title.as_str()).unwrap_or("");
            lines.push(format!("- {}: {}", label, title));
        }

        lines.push(String::new());
        lines.push("周度任务:".to_string());
        if self.weekly.is_empty() {
            lines.push("- 无".to_string());
        }
        for (label, tasks) in self.weekly.iter().take(SUMMARY_WEEKLY_LIMIT) {
            let title = tasks.first().map(|t| t.title.as_str()).unwrap_or("");
            lines.push(format!("- {}: {}", label, title));
        }

        lines.push(String::new());
        lines.push("日度任务:".to_string());
        if self.daily.is_empty() {
            lines.push("- 无".to_string());
        }
        for (label, days) in self.daily.iter().take(SUMMARY_DAILY_WEEKS) {
            lines.push(format!("- {}: {}天任务", label, days.len()));
        }

        lines.join("\n")
    }
}

/// Stage-1 output: one short verdict per analysis agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub task_type: String,
    pub experience_level: String,
    pub time_span: String,
}

/// Result record handed back to the web layer after a full run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownResult {
    /// Opaque unique project token
    pub project_id: String,
    pub analysis: AnalysisResult,
    pub tasks: TaskHierarchy,
    pub follow_up_questions: Vec<FollowUpQuestion>,
}

/// Result of a regeneration round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateResult {
    pub tasks: TaskHierarchy,
    pub follow_up_questions: Vec<FollowUpQuestion>,
    /// Questions in this round not seen in any earlier round
    pub new_question_count: usize,
    /// Near-duplicates of earlier questions, dropped and counted
    pub duplicate_question_count: usize,
}

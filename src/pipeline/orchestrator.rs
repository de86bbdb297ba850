//! Two-stage agent orchestration
//!
//! Stage 1 fans out three analysis agents (task type, experience, time span)
//! on the fast model; stage 2 fans out the breakdown and question agents on
//! the deep model with the assembled analysis. Workers within a stage run
//! concurrently but a stage never starts before the previous one finished,
//! and a worker failure never cancels its siblings - every spawned task is
//! awaited before errors are examined, in a fixed order so the first
//! reported failure is deterministic.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decode::{DecodeError, decode};
use crate::domain::{
    AnalysisResult, AnswerMap, BreakdownResult, FollowUpQuestion, GoalProfile, RegenerateResult, TaskHierarchy,
};
use crate::llm::{ChatMessage, LlmError, ModelClass, ModelGateway};
use crate::normalize::{fallback_hierarchy, normalize};
use crate::pipeline::error::PipelineError;
use crate::pipeline::prompts;
use crate::questions::{default_questions, ensure_categories, screen};

/// Sampling temperature for the stage-1 analysis agents
const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// Sampling temperature for the stage-2 generation agents
const GENERATION_TEMPERATURE: f32 = 0.7;

/// Analysis verdicts are clamped to their first line, at most this many chars
const ANALYSIS_VERDICT_LIMIT: usize = 100;

/// Drives the two-stage agent pipeline
pub struct Orchestrator {
    gateway: Arc<ModelGateway>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Run the full pipeline for a fresh goal
    pub async fn generate(&self, profile: &GoalProfile) -> Result<BreakdownResult, PipelineError> {
        let start = chrono::Local::now().date_naive();
        self.generate_from(profile, start).await
    }

    /// Full pipeline with an explicit plan start date
    pub async fn generate_from(
        &self,
        profile: &GoalProfile,
        start: NaiveDate,
    ) -> Result<BreakdownResult, PipelineError> {
        info!(goal = %profile.goal, "generate: pipeline started");

        let analysis = self.run_analysis_stage(profile, start).await?;
        info!(
            task_type = %analysis.task_type,
            experience = %analysis.experience_level,
            time_span = %analysis.time_span,
            "generate: analysis stage complete"
        );

        let (tasks, questions) = self
            .run_generation_stage(profile, &analysis, &[], None, start)
            .await?;

        Ok(BreakdownResult {
            project_id: Uuid::new_v4().to_string(),
            analysis,
            tasks,
            follow_up_questions: questions,
        })
    }

    /// Regenerate the plan from accumulated answers, skipping stage 1
    ///
    /// The analysis from the original run is reused; the previous hierarchy
    /// is condensed into the prompt rather than resent in full. New
    /// questions are screened against the full cross-round history and
    /// near-duplicates are dropped.
    pub async fn regenerate(
        &self,
        profile: &GoalProfile,
        analysis: &AnalysisResult,
        previous_tasks: &TaskHierarchy,
        question_history: &[FollowUpQuestion],
        answers: &AnswerMap,
    ) -> Result<RegenerateResult, PipelineError> {
        let start = chrono::Local::now().date_naive();
        self.regenerate_from(profile, analysis, previous_tasks, question_history, answers, start)
            .await
    }

    /// Regeneration with an explicit plan start date
    pub async fn regenerate_from(
        &self,
        profile: &GoalProfile,
        analysis: &AnalysisResult,
        previous_tasks: &TaskHierarchy,
        question_history: &[FollowUpQuestion],
        answers: &AnswerMap,
        start: NaiveDate,
    ) -> Result<RegenerateResult, PipelineError> {
        info!(
            answers = answers.len(),
            history = question_history.len(),
            "regenerate: pipeline started"
        );

        let (tasks, questions) = self
            .run_generation_stage(profile, analysis, question_history, Some((previous_tasks, answers)), start)
            .await?;

        let candidate_count = questions.len();
        let history_texts: Vec<String> = question_history.iter().map(|q| q.question.clone()).collect();
        let screened = screen(questions, &history_texts);

        let kept: Vec<FollowUpQuestion> = screened
            .into_iter()
            .filter(|s| !s.is_duplicate)
            .map(|s| s.question)
            .collect();
        let duplicate_question_count = candidate_count - kept.len();

        info!(
            new = kept.len(),
            duplicates = duplicate_question_count,
            "regenerate: question screening complete"
        );

        Ok(RegenerateResult {
            tasks,
            new_question_count: kept.len(),
            duplicate_question_count,
            follow_up_questions: kept,
        })
    }

    /// Stage 1: three concurrent analysis agents on the fast model
    ///
    /// All three handles are awaited before any error is inspected, so one
    /// agent failing never cancels the others mid-flight. Errors are then
    /// reported in fixed agent order.
    async fn run_analysis_stage(
        &self,
        profile: &GoalProfile,
        start: NaiveDate,
    ) -> Result<AnalysisResult, PipelineError> {
        let task_type_handle = {
            let gateway = Arc::clone(&self.gateway);
            let prompt = prompts::task_type_prompt(profile);
            tokio::spawn(async move {
                gateway
                    .invoke(vec![ChatMessage::user(prompt)], ANALYSIS_TEMPERATURE, ModelClass::Fast)
                    .await
            })
        };

        let experience_handle = {
            let gateway = Arc::clone(&self.gateway);
            let prompt = prompts::experience_prompt(profile);
            tokio::spawn(async move {
                gateway
                    .invoke(vec![ChatMessage::user(prompt)], ANALYSIS_TEMPERATURE, ModelClass::Fast)
                    .await
            })
        };

        let time_span_handle = {
            let gateway = Arc::clone(&self.gateway);
            let prompt = prompts::time_span_prompt(profile, start);
            tokio::spawn(async move {
                gateway
                    .invoke(vec![ChatMessage::user(prompt)], ANALYSIS_TEMPERATURE, ModelClass::Fast)
                    .await
            })
        };

        let task_type = task_type_handle.await?;
        let experience = experience_handle.await?;
        let time_span = time_span_handle.await?;

        let task_type = task_type.map_err(|source| PipelineError::Agent {
            agent: "task-type",
            source,
        })?;
        let experience = experience.map_err(|source| PipelineError::Agent {
            agent: "experience",
            source,
        })?;
        let time_span = time_span.map_err(|source| PipelineError::Agent {
            agent: "time-span",
            source,
        })?;

        Ok(AnalysisResult {
            task_type: verdict_line(&task_type),
            experience_level: verdict_line(&experience),
            time_span: verdict_line(&time_span),
        })
    }

    /// Stage 2: breakdown and question agents, concurrent on the deep model
    ///
    /// A breakdown invocation failure is fatal; unusable breakdown *output*
    /// degrades to the fallback hierarchy. The question agent never fails
    /// the stage - any problem there yields the stock questions.
    async fn run_generation_stage(
        &self,
        profile: &GoalProfile,
        analysis: &AnalysisResult,
        question_history: &[FollowUpQuestion],
        prior: Option<(&TaskHierarchy, &AnswerMap)>,
        start: NaiveDate,
    ) -> Result<(TaskHierarchy, Vec<FollowUpQuestion>), PipelineError> {
        let breakdown_handle = {
            let gateway = Arc::clone(&self.gateway);
            let daily_hours = profile.daily_hours_value();
            let user_prompt = match prior {
                Some((previous_tasks, answers)) => {
                    prompts::regenerate_user_prompt(profile, analysis, previous_tasks, answers)
                }
                None => prompts::breakdown_user_prompt(profile, analysis, start),
            };
            let messages = vec![
                ChatMessage::system(prompts::breakdown_system_prompt()),
                ChatMessage::user(user_prompt),
            ];

            tokio::spawn(async move {
                let raw = gateway.invoke(messages, GENERATION_TEMPERATURE, ModelClass::Deep).await?;
                Ok::<TaskHierarchy, LlmError>(hierarchy_from_output(&raw, daily_hours, start))
            })
        };

        let questions_handle = {
            let gateway = Arc::clone(&self.gateway);
            let prompt = prompts::questions_prompt(profile, analysis, question_history);

            tokio::spawn(async move {
                let outcome = gateway
                    .invoke(vec![ChatMessage::user(prompt)], GENERATION_TEMPERATURE, ModelClass::Deep)
                    .await;

                let mut questions = match outcome {
                    Ok(raw) => parse_questions(&raw).unwrap_or_else(|| {
                        warn!("question agent output unusable, substituting defaults");
                        default_questions()
                    }),
                    Err(e) => {
                        warn!(error = %e, "question agent failed, substituting defaults");
                        default_questions()
                    }
                };
                ensure_categories(&mut questions);
                questions
            })
        };

        let breakdown = breakdown_handle.await?;
        let questions = questions_handle.await?;

        let tasks = breakdown.map_err(|source| PipelineError::Agent {
            agent: "breakdown",
            source,
        })?;

        Ok((tasks, questions))
    }
}

/// Decode and normalize breakdown output, degrading to the fallback plan
/// when the text is unrepairable or yields nothing
fn hierarchy_from_output(raw: &str, daily_hours: f64, start: NaiveDate) -> TaskHierarchy {
    match decode(raw) {
        Ok(doc) => match normalize(&doc, start) {
            Ok(hierarchy) => hierarchy,
            Err(e) => {
                warn!(error = %e, "breakdown output normalized to nothing, using fallback plan");
                fallback_hierarchy(daily_hours, start)
            }
        },
        Err(e) => {
            warn!(error = %e, "breakdown output undecodable, using fallback plan");
            fallback_hierarchy(daily_hours, start)
        }
    }
}

/// Clamp an analysis verdict to its first line, bounded length
fn verdict_line(raw: &str) -> String {
    raw.trim()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(ANALYSIS_VERDICT_LIMIT)
        .collect()
}

/// Parse the question agent's output into follow-up questions
///
/// Accepts a bare JSON array or an object wrapping one under
/// `follow_up_questions`; items that fail to deserialize are skipped.
/// Returns `None` when nothing usable survives.
fn parse_questions(raw: &str) -> Option<Vec<FollowUpQuestion>> {
    let value = match decode(raw) {
        Ok(v) => v,
        // Short output is fine for a question list; try a direct parse.
        Err(DecodeError::TooShort { .. }) => serde_json::from_str(raw.trim()).ok()?,
        Err(_) => return None,
    };

    let items = match &value {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(obj) => obj.get("follow_up_questions")?.as_array()?.as_slice(),
        _ => return None,
    };

    let questions: Vec<FollowUpQuestion> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();

    debug!(parsed = questions.len(), raw_items = items.len(), "parse_questions: done");
    if questions.is_empty() { None } else { Some(questions) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_line_clamps() {
        assert_eq!(verdict_line("技能学习类 - 网页开发\n另外我还想说..."), "技能学习类 - 网页开发");

        let long = "长".repeat(200);
        assert_eq!(verdict_line(&long).chars().count(), ANALYSIS_VERDICT_LIMIT);
    }

    #[test]
    fn test_parse_questions_bare_array() {
        let raw = r#"[
            {"id": "q1", "question": "你更倾向于哪种学习方式？", "type": "single", "options": ["A", "B"]},
            {"id": "q2", "question": "你每天的学习时段固定吗？", "type": "text"}
        ]"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "q1");
    }

    #[test]
    fn test_parse_questions_wrapped_object() {
        let raw = r#"{
            "follow_up_questions": [
                {"id": "q1", "question": "你之前有类似项目的经验吗？", "type": "single", "options": ["有", "没有"]}
            ],
            "note": "模型顺手加的字段"
        }"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_parse_questions_skips_bad_items() {
        let raw = r#"[
            {"id": "q1", "question": "好问题，这是一个完整的对象，字段齐全可以解析", "type": "text"},
            "这是一个裸字符串，不是问题对象",
            42
        ]"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_parse_questions_nothing_usable() {
        assert!(parse_questions("完全不是JSON的一段长文本，模型这次没有遵守输出格式的要求，而是写了一整段说明性的文字来描述它想问的问题。").is_none());
        assert!(parse_questions("[]").is_none());
    }

    #[test]
    fn test_hierarchy_from_output_falls_back() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let h = hierarchy_from_output("太短", 2.0, start);
        assert!(!h.is_empty());
        assert_eq!(h.daily["第1个月-第1周"]["1月5日"][0].title, "环境准备");
    }
}

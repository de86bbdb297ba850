//! Planforge - goal-to-plan breakdown pipeline
//!
//! Planforge turns a free-text goal into a dated, hierarchical task plan by
//! orchestrating a two-stage fan-out of LLM agents: three fast analysis
//! agents (task type, experience level, time span), then a deep breakdown
//! agent and a follow-up question agent working from the assembled analysis.
//!
//! # Core Concepts
//!
//! - **Staged Fan-out**: Agents within a stage run concurrently; a stage
//!   never starts until the previous one fully finished
//! - **Degrade, Don't Die**: Unusable model output is repaired, normalized,
//!   or replaced with a minimal fallback plan - only invocation-level
//!   failures of required agents surface as errors
//! - **Canonical Hierarchy**: Whatever shape the model emits is normalized
//!   into the fixed yearly/quarterly/monthly/weekly/daily buckets with
//!   derived calendar dates
//! - **Cross-round Memory**: Follow-up questions are screened against every
//!   earlier round so regeneration never re-asks what it already asked
//!
//! # Modules
//!
//! - [`llm`] - Client trait, OpenAI-protocol transport, and retrying gateway
//! - [`decode`] - JSON extraction and repair from raw model text
//! - [`normalize`] - Canonicalization into the five-bucket hierarchy
//! - [`questions`] - Question screening, categorization, and defaults
//! - [`pipeline`] - The two-stage orchestrator and its prompts
//! - [`config`] - Configuration types and loading

pub mod config;
pub mod decode;
pub mod domain;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod questions;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use decode::{DecodeError, decode};
pub use domain::{
    AnalysisResult, AnswerMap, AnswerValue, BreakdownResult, ExperienceLevel, FollowUpQuestion, GoalProfile,
    QuestionCategory, QuestionType, RegenerateResult, TaskHierarchy, TaskNode, merge_answers,
};
pub use llm::{
    ChatMessage, CompletionRequest, CompletionResponse, GatewayConfig, LlmClient, LlmError, ModelClass,
    ModelGateway, OpenAiClient, Role, TokenUsage,
};
pub use normalize::{NormalizeError, fallback_hierarchy, normalize};
pub use pipeline::{Orchestrator, PipelineError};
pub use questions::{ScreenedQuestion, default_questions, ensure_categories, infer_category, is_duplicate, screen};

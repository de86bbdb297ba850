//! Domain types for the breakdown pipeline
//!
//! These are the shapes exchanged with the web layer: the immutable goal
//! profile coming in, and the canonical task hierarchy plus follow-up
//! questions going out.

mod hierarchy;
mod profile;
mod question;

pub use hierarchy::{AnalysisResult, BreakdownResult, RegenerateResult, TaskHierarchy, TaskNode};
pub use profile::{AnswerMap, AnswerValue, ExperienceLevel, GoalProfile, merge_answers};
pub use question::{FollowUpQuestion, QuestionCategory, QuestionType};

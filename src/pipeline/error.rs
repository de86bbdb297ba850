//! Pipeline error types

use thiserror::Error;

use crate::llm::LlmError;

/// Fatal pipeline failures
///
/// Only gateway-level failures of required agents and task-join failures
/// reach the caller; decode and normalize problems are absorbed by the
/// fallback hierarchy, and question-agent failures by the stock questions.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Agent '{agent}' failed: {source}")]
    Agent {
        agent: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Agent task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

//! LLM request/response types
//!
//! These model the chat-completions wire format but stay provider-agnostic:
//! the transport decides how to serialize them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        debug!("ChatMessage::system: called");
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("ChatMessage::user: called");
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("ChatMessage::assistant: called");
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// A completion request - everything needed for one model call
///
/// The gateway fills in model name, token ceiling, and timeout from the
/// selected model class; the transport applies them as-is.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Resolved model identifier
    pub model: String,

    /// Ordered role-tagged messages
    pub messages: Vec<ChatMessage>,

    pub temperature: f32,

    /// Max tokens for the response
    pub max_tokens: u32,

    /// Per-call deadline, applied by the transport
    pub timeout: Duration,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text, if the model produced any
    pub content: Option<String>,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Build a plain-text response (handy in tests)
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            usage: TokenUsage::default(),
        }
    }
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

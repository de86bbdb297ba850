//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless model transport - one prompt/response exchange per call
///
/// Implementations issue exactly one attempt and map transport failures to
/// typed errors; retry, backoff, and model selection live in the gateway.
/// Must be safe for concurrent use by multiple pipeline workers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

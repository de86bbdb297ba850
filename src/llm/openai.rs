//! OpenAI-compatible chat-completions transport
//!
//! Single-attempt client for any endpoint speaking the OpenAI chat protocol
//! (the default deployment targets SiliconFlow). Retry policy belongs to the
//! gateway, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};
use crate::config::LlmConfig;

/// Fallback retry-after when the endpoint rate-limits without a header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// OpenAI-protocol API client
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenAiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    /// No default timeout is set on the shared client; each request carries
    /// its own deadline from the gateway.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let http = Client::builder().build().map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }

    /// Build the request body for the chat-completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %request.model, max_tokens = request.max_tokens, "build_request_body: called");
        serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, api_response: ChatResponse) -> CompletionResponse {
        let content = api_response.choices.into_iter().next().and_then(|c| c.message.content);

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse { content, usage }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %request.model, timeout = ?request.timeout, "complete: called");
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = match self
            .http
            .post(&url)
            .timeout(request.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                debug!(timeout = ?request.timeout, "complete: request timed out");
                return Err(LlmError::Timeout(request.timeout));
            }
            Err(e) => {
                debug!(error = %e, "complete: network error");
                return Err(LlmError::Network(e));
            }
        };

        let status = response.status().as_u16();

        if status == 429 {
            debug!("complete: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(status, "complete: API error");
            return Err(LlmError::ApiError { status, message: text });
        }

        debug!("complete: success");
        let api_response: ChatResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

// Chat-completions response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

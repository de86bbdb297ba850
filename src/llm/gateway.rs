//! Model gateway - retry, backoff, timeout, and model selection policy
//!
//! The single entry point the pipeline agents use to talk to the model
//! endpoint. Owns everything the transport does not: which model name a
//! class resolves to, how long a call may take, and what happens when it
//! fails. Purely functional from the caller's perspective.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{ChatMessage, CompletionRequest, LlmClient, LlmError};

/// Deep models get this multiple of the fast-model timeout - thinking-class
/// models take materially longer to produce their longer structured output.
const DEEP_TIMEOUT_FACTOR: u32 = 5;

/// Output-token ceiling for fast/analysis calls
const FAST_MAX_TOKENS: u32 = 8192;

/// Output-token ceiling for deep/generation calls
const DEEP_MAX_TOKENS: u32 = 16384;

/// Which model tier a call should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    /// Quick analysis verdicts
    Fast,
    /// Long structured generation ("thinking" models)
    Deep,
}

/// Gateway policy knobs, resolved from configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Model name for `ModelClass::Fast`
    pub fast_model: String,

    /// Model name for `ModelClass::Deep`
    pub deep_model: String,

    /// Total attempts per invocation
    pub max_retries: u32,

    /// First backoff delay; doubles each subsequent attempt
    pub backoff_base: Duration,

    /// Fixed, larger delay after a rate-limit signal
    pub rate_limit_backoff: Duration,

    /// Per-call timeout for fast-model requests
    pub fast_timeout: Duration,
}

/// Resilient model-invocation layer
///
/// The underlying client is injected so tests can substitute a fake
/// deterministically; it must be safe for concurrent use because both
/// pipeline stages fan out multiple workers over the same gateway.
pub struct ModelGateway {
    client: Arc<dyn LlmClient>,
    config: GatewayConfig,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn LlmClient>, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    /// Resolve a model class to (model name, token ceiling, timeout)
    fn resolve(&self, class: ModelClass) -> (String, u32, Duration) {
        match class {
            ModelClass::Fast => (self.config.fast_model.clone(), FAST_MAX_TOKENS, self.config.fast_timeout),
            ModelClass::Deep => (
                self.config.deep_model.clone(),
                DEEP_MAX_TOKENS,
                self.config.fast_timeout * DEEP_TIMEOUT_FACTOR,
            ),
        }
    }

    /// Issue one prompt/response exchange with the configured retry budget
    pub async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        class: ModelClass,
    ) -> Result<String, LlmError> {
        self.invoke_with_retries(messages, temperature, class, self.config.max_retries)
            .await
    }

    /// Issue one exchange, retrying transient failures up to `max_retries`
    ///
    /// Exponential backoff between attempts, with a distinct fixed delay for
    /// rate-limit responses. Non-retryable errors surface immediately; after
    /// the retry budget is spent, fails with `RetriesExhausted` carrying the
    /// last underlying cause.
    pub async fn invoke_with_retries(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        class: ModelClass,
        max_retries: u32,
    ) -> Result<String, LlmError> {
        let (model, max_tokens, timeout) = self.resolve(class);
        debug!(%model, ?class, max_retries, "invoke: called");

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..max_retries.max(1) {
            if attempt > 0 {
                let delay = match last_error {
                    Some(ref e) if e.is_rate_limit() => self.config.rate_limit_backoff,
                    _ => self.config.backoff_base * 2u32.pow(attempt - 1),
                };
                warn!(attempt, delay_ms = delay.as_millis() as u64, "invoke: retrying after transient error");
                tokio::time::sleep(delay).await;
            }

            let request = CompletionRequest {
                model: model.clone(),
                messages: messages.clone(),
                temperature,
                max_tokens,
                timeout,
            };

            match self.client.complete(request).await {
                Ok(response) => {
                    debug!(
                        prompt_tokens = response.usage.prompt_tokens,
                        completion_tokens = response.usage.completion_tokens,
                        "invoke: success"
                    );
                    return response
                        .content
                        .filter(|c| !c.trim().is_empty())
                        .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()));
                }
                Err(e) if e.is_retryable() => {
                    debug!(attempt, error = %e, "invoke: retryable failure");
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(error = %e, "invoke: non-retryable failure");
                    return Err(e);
                }
            }
        }

        let source = last_error.unwrap_or_else(|| LlmError::InvalidResponse("no attempts made".to_string()));
        warn!(attempts = max_retries, error = %source, "invoke: retries exhausted");
        Err(LlmError::RetriesExhausted {
            attempts: max_retries,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            fast_model: "fast-model".to_string(),
            deep_model: "deep-model".to_string(),
            max_retries: 3,
            backoff_base: Duration::from_millis(1),
            rate_limit_backoff: Duration::from_millis(2),
            fast_timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_resolve_deep_scales_timeout_and_tokens() {
        let client = Arc::new(MockLlmClient::new(vec![]));
        let gateway = ModelGateway::new(client, test_config());

        let (model, tokens, timeout) = gateway.resolve(ModelClass::Fast);
        assert_eq!(model, "fast-model");
        assert_eq!(tokens, FAST_MAX_TOKENS);
        assert_eq!(timeout, Duration::from_secs(120));

        let (model, tokens, timeout) = gateway.resolve(ModelClass::Deep);
        assert_eq!(model, "deep-model");
        assert_eq!(tokens, DEEP_MAX_TOKENS);
        assert_eq!(timeout, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_invoke_returns_content() {
        let client = Arc::new(MockLlmClient::new(vec![Ok(CompletionResponse::text(
            "技能学习类 - 网页开发",
        ))]));
        let gateway = ModelGateway::new(client, test_config());

        let text = gateway
            .invoke(vec![ChatMessage::user("分析")], 0.3, ModelClass::Fast)
            .await
            .unwrap();
        assert_eq!(text, "技能学习类 - 网页开发");
    }

    #[tokio::test]
    async fn test_invoke_retries_transient_then_succeeds() {
        let client = Arc::new(MockLlmClient::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(120))),
            Err(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok(CompletionResponse::text("中期(3个月) - 月度+周度+日度")),
        ]));
        let gateway = ModelGateway::new(Arc::clone(&client) as Arc<dyn LlmClient>, test_config());

        let text = gateway
            .invoke(vec![ChatMessage::user("判断时间跨度")], 0.3, ModelClass::Fast)
            .await
            .unwrap();
        assert!(text.starts_with("中期"));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invoke_exhausts_retries() {
        let client = Arc::new(MockLlmClient::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(120))),
            Err(LlmError::Timeout(Duration::from_secs(120))),
            Err(LlmError::Timeout(Duration::from_secs(120))),
        ]));
        let gateway = ModelGateway::new(Arc::clone(&client) as Arc<dyn LlmClient>, test_config());

        let err = gateway
            .invoke(vec![ChatMessage::user("评估")], 0.3, ModelClass::Fast)
            .await
            .unwrap_err();

        match err {
            LlmError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, LlmError::Timeout(_)));
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invoke_non_retryable_surfaces_immediately() {
        let client = Arc::new(MockLlmClient::new(vec![Err(LlmError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        })]));
        let gateway = ModelGateway::new(Arc::clone(&client) as Arc<dyn LlmClient>, test_config());

        let err = gateway
            .invoke(vec![ChatMessage::user("分析")], 0.3, ModelClass::Fast)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 401, .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invoke_rejects_empty_completion() {
        let client = Arc::new(MockLlmClient::new(vec![Ok(CompletionResponse {
            content: Some("   ".to_string()),
            usage: Default::default(),
        })]));
        let gateway = ModelGateway::new(client, test_config());

        let err = gateway
            .invoke(vec![ChatMessage::user("分析")], 0.3, ModelClass::Fast)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}

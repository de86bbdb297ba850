//! LLM integration layer
//!
//! Split into a stateless transport ([`LlmClient`] / [`OpenAiClient`]) and a
//! policy layer ([`ModelGateway`]) that owns model selection, timeouts, and
//! retries. Pipeline code only ever sees the gateway.

pub mod client;
pub mod error;
pub mod gateway;
pub mod openai;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use gateway::{GatewayConfig, ModelClass, ModelGateway};
pub use openai::OpenAiClient;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, Role, TokenUsage};

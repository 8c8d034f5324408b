//! LLM transport for askdb.
//!
//! One capability: send a system+user prompt pair to a remote text service
//! and get the completion back. The services that call this wrap transport
//! failures into their own stage errors (classification, generation, ...).

pub mod azure;
pub mod mock;

pub use azure::{AzureOpenAiClient, AzureOpenAiConfig};
pub use mock::MockLlmClient;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level LLM failure.
///
/// Deliberately not part of the stage taxonomy: each service wraps this into
/// the error kind that names its own stage.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LlmError(pub String);

impl LlmError {
    /// Creates a transport error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One chat-completion invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Deployment (model) identifier for this call.
    pub deployment: String,
    /// System instruction constraining the reply.
    pub system: String,
    /// User content.
    pub user: String,
    /// Output token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ChatRequest {
    /// Creates a request with the given deployment and prompts.
    pub fn new(
        deployment: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            deployment: deployment.into(),
            system: system.into(),
            user: user.into(),
            max_tokens: 500,
            temperature: 0.0,
        }
    }

    /// Sets the output token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Trait for clients that can produce chat completions.
///
/// Implementations must be thread-safe (Send + Sync) so concurrent pipeline
/// invocations can share one client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends the request and returns the completion text.
    async fn complete(&self, request: &ChatRequest) -> std::result::Result<String, LlmError>;
}

//! Azure OpenAI chat-completions client.
//!
//! Implements the LlmClient trait against Azure's deployment-scoped endpoint.
//! Transient failures (rate limits, 5xx, connect timeouts) are retried with
//! exponential backoff up to a configured attempt bound.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{ChatRequest, LlmClient, LlmError};

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Azure OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Resource endpoint, e.g. `https://myresource.openai.azure.com`.
    pub endpoint: String,
    /// API version query parameter.
    pub api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum attempts per call.
    pub max_attempts: u32,
}

impl AzureOpenAiConfig {
    /// Creates a new config with the given key, endpoint, and API version.
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            api_version: api_version.into(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum attempts per call.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Azure OpenAI LLM client.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    config: AzureOpenAiConfig,
    client: Client,
}

impl AzureOpenAiClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: AzureOpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::new(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Builds the deployment-scoped completions URL.
    fn completion_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            deployment,
            self.config.api_version
        )
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (LlmError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                LlmError::new("authentication failed; check AZURE_API_KEY"),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (LlmError::new("rate limited by Azure OpenAI"), true);
        }

        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<AzureErrorResponse>(body) {
            return (
                LlmError::new(format!("Azure OpenAI error: {}", error_response.error.message)),
                is_retryable,
            );
        }

        (
            LlmError::new(format!("Azure OpenAI error ({status}): {body}")),
            is_retryable,
        )
    }

    /// Determines if a request error is retryable.
    fn is_retryable_request_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = self.completion_url(&request.deployment);
        let payload = CompletionPayload {
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ApiMessage {
                    role: "user",
                    content: request.user.clone(),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=self.config.max_attempts {
            debug!(
                deployment = %request.deployment,
                attempt,
                max_attempts = self.config.max_attempts,
                "Azure OpenAI request"
            );

            let result = self
                .client
                .post(&url)
                .header("api-key", &self.config.api_key)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| LlmError::new(format!("failed to read response: {e}")))?;

                    if status.is_success() {
                        let parsed: CompletionResponse = serde_json::from_str(&body)
                            .map_err(|e| LlmError::new(format!("failed to parse response: {e}")))?;

                        return parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .map(|content| content.trim().to_string())
                            .ok_or_else(|| LlmError::new("empty completion from Azure OpenAI"));
                    }

                    let (error, is_retryable) = Self::parse_error(status, &body);
                    last_error = Some(error);

                    if !is_retryable || attempt >= self.config.max_attempts {
                        break;
                    }
                    warn!(attempt, %status, "Azure OpenAI request failed, retrying in {delay:?}");
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable_request_error(&e);
                    let error = if e.is_timeout() {
                        LlmError::new("request to Azure OpenAI timed out")
                    } else if e.is_connect() {
                        LlmError::new("failed to connect to Azure OpenAI")
                    } else {
                        LlmError::new(format!("request failed: {e}"))
                    };
                    last_error = Some(error);

                    if !is_retryable || attempt >= self.config.max_attempts {
                        break;
                    }
                    warn!(attempt, "Azure OpenAI request failed, retrying in {delay:?}");
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| LlmError::new("no attempt was made")))
    }
}

// Azure OpenAI API types

#[derive(Debug, Serialize)]
struct CompletionPayload {
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureErrorResponse {
    error: AzureError,
}

#[derive(Debug, Deserialize)]
struct AzureError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AzureOpenAiClient {
        AzureOpenAiClient::new(AzureOpenAiConfig::new(
            "key",
            "https://example.openai.azure.com/",
            "2025-01-01-preview",
        ))
        .unwrap()
    }

    #[test]
    fn test_completion_url_shape() {
        let client = test_client();
        assert_eq!(
            client.completion_url("gpt-4.1"),
            "https://example.openai.azure.com/openai/deployments/gpt-4.1/chat/completions?api-version=2025-01-01-preview"
        );
    }

    #[test]
    fn test_config_builders() {
        let config = AzureOpenAiConfig::new("k", "e", "v")
            .with_timeout(60)
            .with_max_attempts(0);
        assert_eq!(config.timeout_secs, 60);
        // At least one attempt is always made.
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_parse_error_unauthorized_not_retryable() {
        let (error, is_retryable) =
            AzureOpenAiClient::parse_error(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("authentication failed"));
        assert!(!is_retryable);
    }

    #[test]
    fn test_parse_error_rate_limited_retryable() {
        let (error, is_retryable) =
            AzureOpenAiClient::parse_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(error.to_string().contains("rate limited"));
        assert!(is_retryable);
    }

    #[test]
    fn test_parse_error_extracts_api_message() {
        let body = r#"{"error":{"message":"Invalid deployment"}}"#;
        let (error, _) = AzureOpenAiClient::parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(error.to_string().contains("Invalid deployment"));
    }

    #[test]
    fn test_parse_error_server_error_retryable() {
        let (_, is_retryable) =
            AzureOpenAiClient::parse_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(is_retryable);
    }

    #[test]
    fn test_completion_response_parses() {
        let body = r#"{"choices":[{"message":{"content":"SELECT 1"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("SELECT 1")
        );
    }
}

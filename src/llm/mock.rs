//! Mock LLM client for testing.
//!
//! Returns deterministic responses based on input patterns, so pipeline and
//! service tests run without real API calls.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::{ChatRequest, LlmClient, LlmError};

/// Mock LLM client with pattern-matched canned responses.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern contained in user prompt -> response).
    custom_responses: Vec<(String, String)>,
    /// When set, every call fails with this message.
    failure: Option<String>,
    /// Prompts seen by the client, for assertion in tests.
    calls: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response: when the user prompt contains `pattern`
    /// (case-insensitive), the mock returns `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Makes every call fail with the given message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of completed calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Requests recorded so far.
    pub fn recorded_calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().clone()
    }

    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("classify") {
            return "DATA_QUESTION".to_string();
        }

        if input_lower.contains("all users") || input_lower.contains("show me all users") {
            return "```sql\nSELECT * FROM users\n```".to_string();
        }

        if input_lower.contains("count") {
            return "SELECT COUNT(*) FROM sessions;".to_string();
        }

        "I don't have a canned answer for that.".to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.lock().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(LlmError::new(message.clone()));
        }
        Ok(self.mock_response(&request.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_canned_sql() {
        let client = MockLlmClient::new();
        let request = ChatRequest::new("any", "", "Show me all users");

        let response = client.complete(&request).await.unwrap();

        assert!(response.contains("SELECT * FROM users"));
    }

    #[tokio::test]
    async fn test_mock_custom_response_wins() {
        let client = MockLlmClient::new().with_response("custom", "SELECT custom FROM t");

        let request = ChatRequest::new("any", "", "run the CUSTOM thing");
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response, "SELECT custom FROM t");
    }

    #[tokio::test]
    async fn test_mock_failure_mode() {
        let client = MockLlmClient::new().with_failure("service unavailable");

        let request = ChatRequest::new("any", "", "anything");
        let err = client.complete(&request).await.unwrap_err();

        assert!(err.to_string().contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let client = MockLlmClient::new();
        assert_eq!(client.call_count(), 0);

        let request = ChatRequest::new("gpt-4.1", "sys", "count sessions");
        client.complete(&request).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(client.recorded_calls()[0].deployment, "gpt-4.1");
    }
}

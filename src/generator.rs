//! SQL generation and conversational answers.
//!
//! Renders the schema catalog into a grounded prompt, asks the model for a
//! single SQL statement, and sanitizes what comes back. Prompt construction
//! is deterministic and testable without a remote call.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{AskdbError, Result};
use crate::llm::{ChatRequest, LlmClient};
use crate::models::QueryRequest;
use crate::schema::SchemaCatalog;

const SQL_SYSTEM_PROMPT: &str = "You are an expert Presto SQL generator. \
     Use ONLY the provided schema. \
     If a field has a formula, use the formula instead of the raw column. \
     Return exactly one valid SQL statement, no explanations.";

const ANSWER_SYSTEM_PROMPT: &str = "You are a friendly AI assistant for an analytics system. \
     Be concise, correct, and avoid hallucinating capabilities the system does not have.";

/// Generates SQL from user requests.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Produces a single sanitized SQL statement for the request.
    async fn generate(&self, request: &QueryRequest, schema: &SchemaCatalog) -> Result<String>;
}

/// Answers greetings and general questions conversationally.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produces a conversational answer to a non-data question.
    async fn answer(&self, request: &QueryRequest) -> Result<String>;
}

/// AI service implementing both generation roles over one LLM client.
pub struct AiService {
    config: Arc<Config>,
    client: Arc<dyn LlmClient>,
    identifier_intent: Regex,
    fence_markers: Regex,
}

impl AiService {
    /// Creates the service over the given LLM client.
    pub fn new(config: Arc<Config>, client: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            client,
            identifier_intent: Regex::new(r"(?i)\b(ids?|identifier|k only|return k)\b")
                .expect("identifier-intent pattern is valid"),
            fence_markers: Regex::new(r"```(sql)?").expect("fence pattern is valid"),
        }
    }

    /// Builds the full generation prompt for a request against a schema.
    pub fn build_sql_prompt(&self, request: &QueryRequest, schema: &SchemaCatalog) -> String {
        let mut guidance = vec![
            "- Use ONLY fields provided in the schema below.".to_string(),
            "- Match questions to fields using the friendly field name or description.".to_string(),
            "- If a field has a formula, use the formula instead of the physical column.".to_string(),
            "- Translate user-facing labels to codes when the description indicates mappings (e.g., platform 4 = IOS)."
                .to_string(),
            "- Return ONLY a valid Presto SQL query. No comments, no explanations.".to_string(),
        ];

        if let Some(previous_error) = &request.previous_error {
            guidance.push(format!(
                "- Previous execution error to correct: {previous_error}"
            ));
        }

        if self.identifier_intent.is_match(&request.user_query) {
            guidance.push(
                "- The user wants only identifier columns. Return only the necessary identifier columns."
                    .to_string(),
            );
        }

        let mut sections = vec![
            "Schema definition:".to_string(),
            schema.render_for_prompt(),
            String::new(),
            "User question:".to_string(),
            request.user_query.clone(),
            String::new(),
            "Guidance:".to_string(),
        ];
        sections.extend(guidance);

        sections.join("\n")
    }

    /// Strips code-fence markers and a single trailing statement terminator.
    pub fn sanitize_sql(&self, raw: &str) -> String {
        let without_fences = self.fence_markers.replace_all(raw, "");
        let trimmed = without_fences.trim();
        trimmed.strip_suffix(';').unwrap_or(trimmed).to_string()
    }
}

#[async_trait]
impl SqlGenerator for AiService {
    async fn generate(&self, request: &QueryRequest, schema: &SchemaCatalog) -> Result<String> {
        let prompt = self.build_sql_prompt(request, schema);
        debug!(request_id = %request.id, "generating SQL");

        let chat = ChatRequest::new(&self.config.deployment_query, SQL_SYSTEM_PROMPT, prompt)
            .with_max_tokens(self.config.max_tokens_sql)
            .with_temperature(self.config.temperature_sql);

        let completion = self
            .client
            .complete(&chat)
            .await
            .map_err(|e| AskdbError::query_generation(e.to_string()))?;

        Ok(self.sanitize_sql(&completion))
    }
}

#[async_trait]
impl Responder for AiService {
    async fn answer(&self, request: &QueryRequest) -> Result<String> {
        let prompt = format!(
            "You are an AI assistant for an analytics platform. \
             Provide concise, helpful responses about analytics concepts, metrics, or how to work with the system.\n\n\
             User question: {}",
            request.user_query
        );

        let chat = ChatRequest::new(
            &self.config.deployment_response,
            ANSWER_SYSTEM_PROMPT,
            prompt,
        )
        .with_max_tokens(self.config.max_tokens_response)
        .with_temperature(self.config.temperature_response);

        let completion = self
            .client
            .complete(&chat)
            .await
            .map_err(|e| AskdbError::query_generation(e.to_string()))?;

        Ok(completion.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::schema::{SchemaColumn, SchemaTable};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn test_config() -> Arc<Config> {
        let vars = HashMap::from([
            ("PRESTO_HOST", "presto.internal"),
            ("AZURE_API_KEY", "key"),
            ("AZURE_ENDPOINT", "https://example.openai.azure.com"),
        ]);
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap()
            .into_shared()
    }

    fn service_with(client: MockLlmClient) -> (AiService, Arc<MockLlmClient>) {
        let client = Arc::new(client);
        let service = AiService::new(test_config(), Arc::clone(&client) as Arc<dyn LlmClient>);
        (service, client)
    }

    fn sessions_schema() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.add_table(SchemaTable::new(
            "sessions",
            vec![
                SchemaColumn::new("user_id", "bigint"),
                SchemaColumn::new("active_users", "bigint")
                    .with_label("active_users")
                    .with_formula("count(distinct user_id)"),
            ],
        ));
        catalog
    }

    #[test]
    fn test_prompt_contains_schema_and_question() {
        let (service, _) = service_with(MockLlmClient::new());
        let request = QueryRequest::new("how many users logged in yesterday").unwrap();

        let prompt = service.build_sql_prompt(&request, &sessions_schema());

        assert!(prompt.contains("Schema definition:"));
        assert!(prompt.contains("Table: sessions"));
        assert!(prompt.contains("active_users := count(distinct user_id)"));
        assert!(prompt.contains("User question:\nhow many users logged in yesterday"));
        assert!(prompt.contains("Guidance:"));
    }

    #[test]
    fn test_prompt_echoes_previous_error_verbatim() {
        let (service, _) = service_with(MockLlmClient::new());
        let request = QueryRequest::new("count sessions")
            .unwrap()
            .with_previous_error("line 1:8: Column 'sesions' cannot be resolved");

        let prompt = service.build_sql_prompt(&request, &sessions_schema());

        assert!(prompt.contains(
            "- Previous execution error to correct: line 1:8: Column 'sesions' cannot be resolved"
        ));
    }

    #[test]
    fn test_prompt_identifier_hint() {
        let (service, _) = service_with(MockLlmClient::new());

        let with_hint = QueryRequest::new("give me the session ids from yesterday").unwrap();
        let prompt = service.build_sql_prompt(&with_hint, &sessions_schema());
        assert!(prompt.contains("only identifier columns"));

        let without_hint = QueryRequest::new("count sessions from yesterday").unwrap();
        let prompt = service.build_sql_prompt(&without_hint, &sessions_schema());
        assert!(!prompt.contains("only identifier columns"));
    }

    #[test]
    fn test_sanitize_strips_fences_and_terminator() {
        let (service, _) = service_with(MockLlmClient::new());

        let raw = "```sql\nSELECT count(distinct user_id) FROM sessions;\n```";
        assert_eq!(
            service.sanitize_sql(raw),
            "SELECT count(distinct user_id) FROM sessions"
        );
    }

    #[test]
    fn test_sanitize_round_trip_is_identity_for_clean_sql() {
        let (service, _) = service_with(MockLlmClient::new());
        let clean = "SELECT user_id FROM sessions WHERE day = current_date";

        let fenced = format!("```sql\n{clean};\n```");
        assert_eq!(service.sanitize_sql(&fenced), clean);
        assert_eq!(service.sanitize_sql(clean), clean);
    }

    #[test]
    fn test_sanitize_handles_bare_fences() {
        let (service, _) = service_with(MockLlmClient::new());
        assert_eq!(
            service.sanitize_sql("```\nSELECT 1\n```"),
            "SELECT 1"
        );
    }

    #[test]
    fn test_sanitize_drops_only_one_terminator() {
        let (service, _) = service_with(MockLlmClient::new());
        assert_eq!(service.sanitize_sql("SELECT 1;;"), "SELECT 1;");
    }

    #[tokio::test]
    async fn test_generate_returns_sanitized_sql() {
        let mock = MockLlmClient::new()
            .with_response("User question:", "```sql\nSELECT count(*) FROM sessions;\n```");
        let (service, client) = service_with(mock);
        let request = QueryRequest::new("how many sessions").unwrap();

        let sql = service.generate(&request, &sessions_schema()).await.unwrap();

        assert_eq!(sql, "SELECT count(*) FROM sessions");
        let call = &client.recorded_calls()[0];
        assert_eq!(call.max_tokens, 800);
        assert_eq!(call.temperature, 0.3);
        assert!(call.system.contains("Presto SQL generator"));
    }

    #[tokio::test]
    async fn test_generate_failure_wraps_as_query_generation() {
        let (service, _) = service_with(MockLlmClient::new().with_failure("quota exceeded"));
        let request = QueryRequest::new("how many sessions").unwrap();

        let err = service
            .generate(&request, &sessions_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, AskdbError::QueryGeneration(_)));
    }

    #[tokio::test]
    async fn test_answer_uses_response_deployment() {
        let mock = MockLlmClient::new().with_response("analytics platform", "Metrics are numbers.");
        let (service, client) = service_with(mock);
        let request = QueryRequest::new("what is a metric?").unwrap();

        let answer = service.answer(&request).await.unwrap();

        assert_eq!(answer, "Metrics are numbers.");
        let call = &client.recorded_calls()[0];
        assert_eq!(call.max_tokens, 500);
        assert_eq!(call.temperature, 0.5);
    }

    #[tokio::test]
    async fn test_answer_failure_wraps_as_query_generation() {
        let (service, _) = service_with(MockLlmClient::new().with_failure("offline"));
        let request = QueryRequest::new("what is a metric?").unwrap();

        let err = service.answer(&request).await.unwrap_err();
        assert!(matches!(err, AskdbError::QueryGeneration(_)));
    }
}

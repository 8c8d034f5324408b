//! Query pipeline orchestration.
//!
//! `QueryProcessor` wires triage, schema access, SQL generation, and
//! execution into one flow. It never returns an error to the caller: every
//! stage failure degrades into a user-facing message so an interactive
//! session keeps going.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::QueryExecutor;
use crate::error::AskdbError;
use crate::generator::{Responder, SqlGenerator};
use crate::models::{QueryRequest, QueryResult};
use crate::schema::SchemaProvider;
use crate::triage::{Classifier, Intent};

/// High-level orchestrator for the question-to-answer workflow.
pub struct QueryProcessor {
    config: Arc<Config>,
    classifier: Arc<dyn Classifier>,
    generator: Arc<dyn SqlGenerator>,
    responder: Arc<dyn Responder>,
    schema: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
}

impl QueryProcessor {
    /// Wires the pipeline from its service seams.
    pub fn new(
        config: Arc<Config>,
        classifier: Arc<dyn Classifier>,
        generator: Arc<dyn SqlGenerator>,
        responder: Arc<dyn Responder>,
        schema: Arc<dyn SchemaProvider>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            config,
            classifier,
            generator,
            responder,
            schema,
            executor,
        }
    }

    /// Processes one request end to end and returns the user-facing reply.
    pub async fn process(&self, request: &QueryRequest) -> String {
        info!(query_id = %request.id, question = %request.user_query, "processing query");

        let intent = match self.classifier.classify(request).await {
            Ok(intent) => intent,
            Err(e) => {
                error!(query_id = %request.id, error = %e, "failed to classify query");
                return "I could not determine how to handle that question. Please try rephrasing."
                    .to_string();
            }
        };

        match intent {
            Intent::OutOfScope => "I'm sorry, but that question is outside my current scope. \
                 I can help with video analytics data questions or information about the system."
                .to_string(),
            Intent::Greeting | Intent::GeneralQuestion => self.handle_general_question(request).await,
            Intent::DataQuestion => self.handle_data_question(request).await,
        }
    }

    async fn handle_general_question(&self, request: &QueryRequest) -> String {
        match self.responder.answer(request).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(query_id = %request.id, error = %e, "failed to generate conversational response");
                "I ran into an issue while answering that. Please try again shortly.".to_string()
            }
        }
    }

    async fn handle_data_question(&self, request: &QueryRequest) -> String {
        let schema = match self.schema.get_schema().await {
            Ok(schema) => schema,
            Err(e) => {
                error!(query_id = %request.id, error = %e, "failed to load schema");
                return "I couldn't load the schema information required to generate SQL. \
                     Please verify the schema configuration and try again."
                    .to_string();
            }
        };

        let sql = match self.generator.generate(request, &schema).await {
            Ok(sql) => sql,
            Err(e) => {
                error!(query_id = %request.id, error = %e, "SQL generation failed");
                return "I wasn't able to generate a valid SQL query for that question. \
                     Please revise the question or provide more detail."
                    .to_string();
            }
        };

        match self.executor.execute(request, &sql).await {
            Ok(result) => self.format_success_response(&sql, &result),
            Err(AskdbError::DatabaseConnection(e)) => {
                error!(query_id = %request.id, error = %e, "database connection failed");
                "Unable to connect to the database right now. Please try again later.".to_string()
            }
            Err(AskdbError::QueryExecution(e)) => {
                warn!(query_id = %request.id, error = %e, "SQL execution failed");
                format!(
                    "Generated SQL Query:\n\n{sql}\n\n\
                     The query failed to execute. Please review the SQL and try again."
                )
            }
            Err(e) => {
                error!(query_id = %request.id, error = %e, "unexpected database error");
                format!(
                    "Generated SQL Query:\n\n{sql}\n\n\
                     An unexpected error occurred while executing the query."
                )
            }
        }
    }

    /// Formats the SQL and a bounded result preview for display.
    fn format_success_response(&self, sql: &str, result: &QueryResult) -> String {
        if result.rows.is_empty() {
            return format!("Generated SQL Query:\n\n{sql}\n\nNo results were returned.");
        }

        let plural = if result.row_count != 1 { "s" } else { "" };
        let mut lines = vec![
            "Generated SQL Query:".to_string(),
            String::new(),
            sql.to_string(),
            String::new(),
            format!("Results ({} row{plural}):", result.row_count),
            String::new(),
        ];

        let preview = &result.rows[..result.rows.len().min(self.config.max_results_display)];
        for (idx, row) in preview.iter().enumerate() {
            let rendered = serde_json::to_string(row).unwrap_or_else(|_| format!("{row:?}"));
            lines.push(format!("{}. {rendered}", idx + 1));
        }

        let remaining = result.row_count.saturating_sub(preview.len());
        if remaining > 0 {
            lines.push(String::new());
            lines.push(format!("... and {remaining} more row(s)."));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockQueryExecutor;
    use crate::generator::AiService;
    use crate::llm::{LlmClient, MockLlmClient};
    use crate::schema::{FileSchemaProvider, SchemaCatalog, SchemaColumn, SchemaTable};
    use crate::triage::TriageService;
    use std::collections::HashMap;

    fn test_config() -> Arc<Config> {
        let vars = HashMap::from([
            ("PRESTO_HOST", "presto.internal"),
            ("AZURE_API_KEY", "key"),
            ("AZURE_ENDPOINT", "https://example.openai.azure.com"),
            ("MAX_RESULTS_DISPLAY", "2"),
        ]);
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap()
            .into_shared()
    }

    fn sessions_provider() -> Arc<FileSchemaProvider> {
        Arc::new(FileSchemaProvider::with_loader(Arc::new(|| {
            let mut catalog = SchemaCatalog::new();
            catalog.add_table(SchemaTable::new(
                "sessions",
                vec![SchemaColumn::new("user_id", "bigint")],
            ));
            Ok(catalog)
        })))
    }

    fn failing_provider() -> Arc<FileSchemaProvider> {
        Arc::new(FileSchemaProvider::with_loader(Arc::new(|| {
            Err(AskdbError::schema_load("definition corrupt"))
        })))
    }

    fn processor(
        llm: MockLlmClient,
        executor: MockQueryExecutor,
        schema: Arc<FileSchemaProvider>,
    ) -> QueryProcessor {
        let config = test_config();
        let llm: Arc<dyn LlmClient> = Arc::new(llm);
        let ai = Arc::new(AiService::new(Arc::clone(&config), Arc::clone(&llm)));
        QueryProcessor::new(
            Arc::clone(&config),
            Arc::new(TriageService::new(Arc::clone(&config), Arc::clone(&llm))),
            Arc::clone(&ai) as Arc<dyn SqlGenerator>,
            ai as Arc<dyn Responder>,
            schema,
            Arc::new(executor),
        )
    }

    fn count_row(n: i64) -> crate::models::Row {
        MockQueryExecutor::row(&[("_col0", serde_json::json!(n))])
    }

    #[tokio::test]
    async fn test_greeting_gets_conversational_answer() {
        let llm = MockLlmClient::new().with_response("User question:", "Hello! Ask me about your data.");
        let processor = processor(llm, MockQueryExecutor::new(), sessions_provider());
        let request = QueryRequest::new("hello there").unwrap();

        let reply = processor.process(&request).await;

        assert_eq!(reply, "Hello! Ask me about your data.");
    }

    #[tokio::test]
    async fn test_out_of_scope_gets_canned_reply() {
        let llm = MockLlmClient::new().with_response("classify", "OUT_OF_SCOPE");
        let processor = processor(llm, MockQueryExecutor::new(), sessions_provider());
        let request = QueryRequest::new("write me a poem about ducks").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("outside my current scope"));
    }

    #[tokio::test]
    async fn test_data_question_formats_sql_and_rows() {
        let llm = MockLlmClient::new()
            .with_response("classify", "DATA_QUESTION")
            .with_response("User question:", "```sql\nSELECT COUNT(*) FROM sessions;\n```");
        let executor = MockQueryExecutor::new().with_result(
            "count(*)",
            vec!["_col0"],
            vec![count_row(42)],
        );
        let processor = processor(llm, executor, sessions_provider());
        let request = QueryRequest::new("how many sessions do we have").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.starts_with("Generated SQL Query:\n\nSELECT COUNT(*) FROM sessions\n"));
        assert!(reply.contains("Results (1 row):"));
        assert!(reply.contains("1. {\"_col0\":42}"));
    }

    #[tokio::test]
    async fn test_data_question_truncates_long_results() {
        let llm = MockLlmClient::new()
            .with_response("classify", "DATA_QUESTION")
            .with_response("User question:", "SELECT user_id FROM sessions");
        let executor = MockQueryExecutor::new().with_result(
            "user_id",
            vec!["user_id"],
            (0..5).map(count_row).collect(),
        );
        let processor = processor(llm, executor, sessions_provider());
        let request = QueryRequest::new("list the session user rows").unwrap();

        let reply = processor.process(&request).await;

        // max_results_display is 2 in the test config.
        assert!(reply.contains("Results (5 rows):"));
        assert!(reply.contains("2. "));
        assert!(!reply.contains("3. "));
        assert!(reply.contains("... and 3 more row(s)."));
    }

    #[tokio::test]
    async fn test_data_question_empty_result() {
        let llm = MockLlmClient::new()
            .with_response("classify", "DATA_QUESTION")
            .with_response("User question:", "SELECT user_id FROM sessions WHERE 1 = 0");
        let processor = processor(llm, MockQueryExecutor::new(), sessions_provider());
        let request = QueryRequest::new("sessions from the year 1900").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("No results were returned."));
    }

    #[tokio::test]
    async fn test_execution_failure_shows_sql_with_apology() {
        let llm = MockLlmClient::new()
            .with_response("classify", "DATA_QUESTION")
            .with_response("User question:", "SELECT bogus FROM sessions");
        let executor =
            MockQueryExecutor::new().with_failure("line 1:8: Column 'bogus' cannot be resolved");
        let processor = processor(llm, executor, sessions_provider());
        let request = QueryRequest::new("select the bogus column").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("Generated SQL Query:\n\nSELECT bogus FROM sessions"));
        assert!(reply.contains("The query failed to execute."));
    }

    #[tokio::test]
    async fn test_schema_failure_degrades_to_message() {
        let llm = MockLlmClient::new().with_response("classify", "DATA_QUESTION");
        let processor = processor(llm, MockQueryExecutor::new(), failing_provider());
        let request = QueryRequest::new("how many sessions do we have").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("couldn't load the schema information"));
    }

    #[tokio::test]
    async fn test_classification_failure_degrades_to_message() {
        let llm = MockLlmClient::new().with_failure("offline");
        let processor = processor(llm, MockQueryExecutor::new(), sessions_provider());
        let request = QueryRequest::new("how many sessions do we have").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("could not determine how to handle"));
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_message() {
        // Split clients: classification succeeds, the responder fails.
        let llm = MockLlmClient::new().with_response("classify", "GENERAL_QUESTION");
        let failing_llm = MockLlmClient::new().with_failure("quota exceeded");

        // General question path with a failing responder.
        let config = test_config();
        let classify_client: Arc<dyn LlmClient> = Arc::new(llm);
        let respond_client: Arc<dyn LlmClient> = Arc::new(failing_llm);
        let ai = Arc::new(AiService::new(Arc::clone(&config), respond_client));
        let processor = QueryProcessor::new(
            Arc::clone(&config),
            Arc::new(TriageService::new(Arc::clone(&config), classify_client)),
            Arc::clone(&ai) as Arc<dyn SqlGenerator>,
            ai as Arc<dyn Responder>,
            sessions_provider(),
            Arc::new(MockQueryExecutor::new()),
        );
        let request = QueryRequest::new("what is a calculated metric?").unwrap();

        let reply = processor.process(&request).await;

        assert!(reply.contains("I ran into an issue while answering that."));
    }
}

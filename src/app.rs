//! Application container.
//!
//! Assembles the concrete services behind the pipeline's trait seams and owns
//! their lifecycle: schema pre-warm at startup, engine session teardown at
//! shutdown.

use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::db::{DatabaseManager, QueryExecutor};
use crate::error::{AskdbError, Result};
use crate::generator::{AiService, Responder, SqlGenerator};
use crate::llm::{AzureOpenAiClient, AzureOpenAiConfig, LlmClient};
use crate::pipeline::QueryProcessor;
use crate::schema::{FileSchemaProvider, SchemaProvider};
use crate::triage::TriageService;

/// Wires configuration into a ready-to-use query processor.
pub struct AppContainer {
    config: Arc<Config>,
    schema: Arc<dyn SchemaProvider>,
    database: Arc<DatabaseManager>,
    processor: Arc<QueryProcessor>,
}

impl AppContainer {
    /// Builds every service from the given configuration.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let llm_config = AzureOpenAiConfig::new(
            config.azure_api_key.clone(),
            config.azure_endpoint.clone(),
            config.azure_api_version.clone(),
        )
        .with_timeout(config.llm_timeout_secs)
        .with_max_attempts(config.max_retries);

        let llm: Arc<dyn LlmClient> = Arc::new(
            AzureOpenAiClient::new(llm_config)
                .map_err(|e| AskdbError::internal(e.to_string()))?,
        );

        let schema: Arc<dyn SchemaProvider> =
            Arc::new(FileSchemaProvider::new(config.schema_json_path.clone()));
        let database = Arc::new(DatabaseManager::new(Arc::clone(&config)));
        let ai = Arc::new(AiService::new(Arc::clone(&config), Arc::clone(&llm)));

        let processor = Arc::new(QueryProcessor::new(
            Arc::clone(&config),
            Arc::new(TriageService::new(Arc::clone(&config), llm)),
            Arc::clone(&ai) as Arc<dyn SqlGenerator>,
            ai as Arc<dyn Responder>,
            Arc::clone(&schema),
            Arc::clone(&database) as Arc<dyn QueryExecutor>,
        ));

        Ok(Self {
            config,
            schema,
            database,
            processor,
        })
    }

    /// The application configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The assembled query processor.
    pub fn processor(&self) -> Arc<QueryProcessor> {
        Arc::clone(&self.processor)
    }

    /// The schema provider, for health checks and pre-warming.
    pub fn schema(&self) -> Arc<dyn SchemaProvider> {
        Arc::clone(&self.schema)
    }

    /// The database manager, for health checks.
    pub fn database(&self) -> Arc<DatabaseManager> {
        Arc::clone(&self.database)
    }

    /// Kicks off the schema load so the first question does not pay for it.
    ///
    /// Failures are logged, not returned: a broken schema definition surfaces
    /// on the first data question instead of blocking startup.
    pub async fn warm_up(&self) {
        if let Err(e) = self.schema.get_schema().await {
            warn!(error = %e, "schema pre-warm failed; will retry on first data question");
        }
    }

    /// Releases external resources.
    pub async fn shutdown(&self) -> Result<()> {
        self.database.close().await
    }
}

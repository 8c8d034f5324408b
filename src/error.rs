//! Error types for askdb.
//!
//! Each variant names the pipeline stage that failed, not the transport
//! detail that caused the failure.

use thiserror::Error;

/// Main error type for askdb operations.
#[derive(Error, Debug)]
pub enum AskdbError {
    /// Schema metadata could not be loaded or parsed.
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    /// The user intent could not be classified.
    #[error("Classification error: {0}")]
    Classification(String),

    /// The AI service failed to produce a query.
    #[error("Query generation error: {0}")]
    QueryGeneration(String),

    /// A connection to the database could not be established.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// Executing a generated query failed.
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Caching unexpectedly failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration or environment validation failed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal application errors (unexpected states, join failures, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskdbError {
    /// Creates a schema-load error with the given message.
    pub fn schema_load(msg: impl Into<String>) -> Self {
        Self::SchemaLoad(msg.into())
    }

    /// Creates a classification error with the given message.
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Creates a query-generation error with the given message.
    pub fn query_generation(msg: impl Into<String>) -> Self {
        Self::QueryGeneration(msg.into())
    }

    /// Creates a database-connection error with the given message.
    pub fn database_connection(msg: impl Into<String>) -> Self {
        Self::DatabaseConnection(msg.into())
    }

    /// Creates a query-execution error with the given message.
    pub fn query_execution(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Creates a cache error with the given message.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SchemaLoad(_) => "Schema Load Error",
            Self::Classification(_) => "Classification Error",
            Self::QueryGeneration(_) => "Query Generation Error",
            Self::DatabaseConnection(_) => "Database Connection Error",
            Self::QueryExecution(_) => "Query Execution Error",
            Self::Cache(_) => "Cache Error",
            Self::Configuration(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true for errors that should abort the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias using AskdbError.
pub type Result<T> = std::result::Result<T, AskdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_schema_load() {
        let err = AskdbError::schema_load("schema file not found: data/mapping.json");
        assert_eq!(
            err.to_string(),
            "Schema load error: schema file not found: data/mapping.json"
        );
        assert_eq!(err.category(), "Schema Load Error");
    }

    #[test]
    fn test_error_display_classification() {
        let err = AskdbError::classification("request timed out");
        assert_eq!(err.to_string(), "Classification error: request timed out");
        assert_eq!(err.category(), "Classification Error");
    }

    #[test]
    fn test_error_display_query_generation() {
        let err = AskdbError::query_generation("empty completion");
        assert_eq!(err.to_string(), "Query generation error: empty completion");
        assert_eq!(err.category(), "Query Generation Error");
    }

    #[test]
    fn test_error_display_execution() {
        let err = AskdbError::query_execution("line 1:8: Column 'emal' cannot be resolved");
        assert!(err.to_string().starts_with("Query execution error:"));
        assert_eq!(err.category(), "Query Execution Error");
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(AskdbError::configuration("missing PRESTO_HOST").is_fatal());
        assert!(!AskdbError::database_connection("refused").is_fatal());
        assert!(!AskdbError::cache("store failed").is_fatal());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AskdbError>();
    }
}

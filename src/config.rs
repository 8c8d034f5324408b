//! Configuration management for askdb.
//!
//! All settings come from environment variables (a `.env` file is loaded by
//! `main` via dotenvy before this runs). Configuration is built once at
//! startup, validated, and passed by `Arc` into each service constructor;
//! there is no process-wide memoized singleton.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AskdbError, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment label ("dev", "prod", ...).
    pub app_env: String,

    /// Presto coordinator host. Required.
    pub presto_host: String,
    /// Presto coordinator port.
    pub presto_port: u16,
    /// User reported to the engine.
    pub presto_user: String,
    /// Catalog queries run against.
    pub presto_catalog: String,
    /// Schema queries run against.
    pub presto_schema: String,
    /// Per-request timeout for engine calls, in seconds.
    pub presto_timeout_secs: u64,

    /// Azure OpenAI API key. Required.
    pub azure_api_key: String,
    /// Azure OpenAI endpoint, e.g. `https://myresource.openai.azure.com`. Required.
    pub azure_endpoint: String,
    /// Azure OpenAI API version.
    pub azure_api_version: String,
    /// Per-request timeout for LLM calls, in seconds.
    pub llm_timeout_secs: u64,

    /// Deployment used for SQL generation.
    pub deployment_query: String,
    /// Deployment used for intent classification.
    pub deployment_classification: String,
    /// Deployment used for conversational responses.
    pub deployment_response: String,

    /// Token budget for generated SQL.
    pub max_tokens_sql: u32,
    /// Token budget for conversational responses.
    pub max_tokens_response: u32,
    /// Sampling temperature for SQL generation.
    pub temperature_sql: f32,
    /// Sampling temperature for conversational responses.
    pub temperature_response: f32,

    /// Maximum attempts for a single LLM transport call.
    pub max_retries: u32,
    /// Maximum rows shown in a formatted response.
    pub max_results_display: usize,

    /// Log file path.
    pub log_file: PathBuf,
    /// Path to the JSON schema definition.
    pub schema_json_path: PathBuf,
    /// Path to the JSONL query history file.
    pub query_history_path: PathBuf,

    /// Reserved: TTL for a future schema re-load policy, in seconds.
    pub cache_ttl_schema_seconds: u64,
    /// TTL for cached classification results, in seconds.
    pub cache_ttl_classification_seconds: u64,

    /// When false, generated SQL is returned as a preview and never executed.
    pub execute_queries: bool,
}

impl Config {
    /// Builds configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Exists so tests can supply variables without mutating the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            app_env: get("APP_ENV").unwrap_or_else(|| "dev".to_string()),

            presto_host: get("PRESTO_HOST").unwrap_or_default(),
            presto_port: parse_number(get("PRESTO_PORT"), "PRESTO_PORT", 8090)?,
            presto_user: get("PRESTO_USER").unwrap_or_else(|| "hadoop".to_string()),
            presto_catalog: get("PRESTO_CATALOG").unwrap_or_else(|| "hive".to_string()),
            presto_schema: get("PRESTO_SCHEMA").unwrap_or_else(|| "test".to_string()),
            presto_timeout_secs: parse_number(get("PRESTO_TIMEOUT_SECS"), "PRESTO_TIMEOUT_SECS", 60)?,

            azure_api_key: get("AZURE_API_KEY").unwrap_or_default(),
            azure_endpoint: get("AZURE_ENDPOINT").unwrap_or_default(),
            azure_api_version: get("AZURE_API_VERSION")
                .unwrap_or_else(|| "2025-01-01-preview".to_string()),
            llm_timeout_secs: parse_number(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 30)?,

            deployment_query: get("AZURE_DEPLOYMENT_QUERY").unwrap_or_else(|| "gpt-4.1".to_string()),
            deployment_classification: get("AZURE_DEPLOYMENT_CLASSIFICATION")
                .unwrap_or_else(|| "gpt-4.1".to_string()),
            deployment_response: get("AZURE_DEPLOYMENT_RESPONSE")
                .unwrap_or_else(|| "gpt-4.1".to_string()),

            max_tokens_sql: parse_number(get("MAX_TOKENS_SQL"), "MAX_TOKENS_SQL", 800)?,
            max_tokens_response: parse_number(get("MAX_TOKENS_RESPONSE"), "MAX_TOKENS_RESPONSE", 500)?,
            temperature_sql: parse_number(get("TEMPERATURE_SQL"), "TEMPERATURE_SQL", 0.3)?,
            temperature_response: parse_number(
                get("TEMPERATURE_RESPONSE"),
                "TEMPERATURE_RESPONSE",
                0.5,
            )?,

            max_retries: parse_number(get("MAX_RETRIES"), "MAX_RETRIES", 2)?,
            max_results_display: parse_number(get("MAX_RESULTS_DISPLAY"), "MAX_RESULTS_DISPLAY", 5)?,

            log_file: get("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("askdb.log")),
            schema_json_path: get("SCHEMA_JSON_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/mapping.json")),
            query_history_path: get("QUERY_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("query_history.jsonl")),

            cache_ttl_schema_seconds: parse_number(
                get("CACHE_TTL_SCHEMA_SECONDS"),
                "CACHE_TTL_SCHEMA_SECONDS",
                900,
            )?,
            cache_ttl_classification_seconds: parse_number(
                get("CACHE_TTL_CLASSIFICATION_SECONDS"),
                "CACHE_TTL_CLASSIFICATION_SECONDS",
                300,
            )?,

            execute_queries: get("EXECUTE_QUERIES").map(|v| parse_bool(&v)).unwrap_or(true),
        };

        config.ensure_valid()?;
        Ok(config)
    }

    /// Raises a configuration error if any critical value is missing.
    pub fn ensure_valid(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.azure_api_key.is_empty() {
            missing.push("AZURE_API_KEY");
        }
        if self.azure_endpoint.is_empty() {
            missing.push("AZURE_ENDPOINT");
        }
        if self.presto_host.is_empty() {
            missing.push("PRESTO_HOST");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AskdbError::configuration(format!(
                "Missing required configuration values: {}. \
                 Provide them via environment variables or a .env file.",
                missing.join(", ")
            )))
        }
    }

    /// Wraps the configuration for shared ownership across services.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            AskdbError::configuration(format!("Invalid value for {key}: '{raw}'"))
        }),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("PRESTO_HOST", "presto.internal"),
            ("AZURE_API_KEY", "key-123"),
            ("AZURE_ENDPOINT", "https://example.openai.azure.com"),
        ])
    }

    fn config_from(vars: HashMap<&str, &str>) -> Result<Config> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config = config_from(base_vars()).unwrap();

        assert_eq!(config.presto_host, "presto.internal");
        assert_eq!(config.presto_port, 8090);
        assert_eq!(config.presto_user, "hadoop");
        assert_eq!(config.presto_catalog, "hive");
        assert_eq!(config.deployment_query, "gpt-4.1");
        assert_eq!(config.max_tokens_sql, 800);
        assert_eq!(config.max_results_display, 5);
        assert!(config.execute_queries);
        assert_eq!(config.schema_json_path, PathBuf::from("data/mapping.json"));
    }

    #[test]
    fn test_missing_required_lists_all_keys() {
        let err = config_from(HashMap::new()).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("AZURE_API_KEY"));
        assert!(msg.contains("AZURE_ENDPOINT"));
        assert!(msg.contains("PRESTO_HOST"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_required_value_treated_as_missing() {
        let mut vars = base_vars();
        vars.insert("PRESTO_HOST", "   ");
        let err = config_from(vars).unwrap_err();
        assert!(err.to_string().contains("PRESTO_HOST"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("APP_ENV", "prod");
        vars.insert("PRESTO_PORT", "8443");
        vars.insert("MAX_RESULTS_DISPLAY", "3");
        vars.insert("TEMPERATURE_SQL", "0.0");
        vars.insert("EXECUTE_QUERIES", "false");

        let config = config_from(vars).unwrap();

        assert_eq!(config.app_env, "prod");
        assert_eq!(config.presto_port, 8443);
        assert_eq!(config.max_results_display, 3);
        assert_eq!(config.temperature_sql, 0.0);
        assert!(!config.execute_queries);
    }

    #[test]
    fn test_invalid_number_is_configuration_error() {
        let mut vars = base_vars();
        vars.insert("PRESTO_PORT", "not-a-port");

        let err = config_from(vars).unwrap_err();
        assert!(err.to_string().contains("PRESTO_PORT"));
    }

    #[test]
    fn test_parse_bool_variants() {
        for truthy in ["1", "true", "YES", " y "] {
            assert!(parse_bool(truthy), "{truthy} should parse as true");
        }
        for falsy in ["0", "false", "no", "off", ""] {
            assert!(!parse_bool(falsy), "{falsy} should parse as false");
        }
    }
}

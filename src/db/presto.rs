//! Presto REST protocol session.
//!
//! Speaks the coordinator's statement protocol directly: POST the SQL to
//! `/v1/statement`, then follow `nextUri` until the result set is drained or
//! the engine reports an error. The client is blocking by design; callers run
//! it inside `spawn_blocking` so the statement protocol never ties up the
//! async scheduler.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AskdbError, Result};
use crate::models::Row;

/// Delay before re-polling a coordinator that answered 503.
const BUSY_RETRY_DELAY_MS: u64 = 100;

/// Connection settings for one engine session.
#[derive(Debug, Clone)]
pub struct PrestoSessionConfig {
    /// Coordinator host.
    pub host: String,
    /// Coordinator port.
    pub port: u16,
    /// User reported via `X-Presto-User`.
    pub user: String,
    /// Catalog for unqualified table names.
    pub catalog: String,
    /// Schema for unqualified table names.
    pub schema: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// A single session against one Presto coordinator.
///
/// Holds one HTTP client; statements run sequentially. Concurrency control
/// lives in the manager that owns the session.
#[derive(Debug)]
pub struct PrestoSession {
    config: PrestoSessionConfig,
    client: Client,
}

impl PrestoSession {
    /// Creates a session against the configured coordinator.
    pub fn connect(config: PrestoSessionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AskdbError::database_connection(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    fn statement_url(&self) -> String {
        format!(
            "http://{}:{}/v1/statement",
            self.config.host, self.config.port
        )
    }

    /// Runs one statement to completion and returns (columns, rows).
    pub fn execute(&self, sql: &str) -> Result<(Vec<String>, Vec<Row>)> {
        debug!(host = %self.config.host, "submitting statement");

        let response = self
            .client
            .post(self.statement_url())
            .header("X-Presto-User", &self.config.user)
            .header("X-Presto-Catalog", &self.config.catalog)
            .header("X-Presto-Schema", &self.config.schema)
            .header("X-Presto-Source", "askdb")
            .body(sql.to_string())
            .send()
            .map_err(|e| {
                AskdbError::database_connection(format!(
                    "failed to reach Presto coordinator at {}:{}: {e}",
                    self.config.host, self.config.port
                ))
            })?;

        let mut state: StatementResponse = Self::read_statement_response(response)?;

        let mut columns: Vec<String> = Vec::new();
        let mut raw_rows: Vec<Vec<serde_json::Value>> = Vec::new();

        loop {
            if let Some(error) = state.error.take() {
                return Err(AskdbError::query_execution(error.describe()));
            }

            if columns.is_empty() {
                if let Some(cols) = &state.columns {
                    columns = cols.iter().map(|c| c.name.clone()).collect();
                }
            }
            if let Some(data) = state.data.take() {
                raw_rows.extend(data);
            }

            let Some(next_uri) = state.next_uri else {
                break;
            };
            state = self.poll(&next_uri)?;
        }

        let rows = Self::to_rows(&columns, raw_rows);
        Ok((columns, rows))
    }

    /// Runs a trivial statement to verify the coordinator is reachable.
    pub fn ping(&self) -> Result<()> {
        self.execute("SELECT 1").map(|_| ())
    }

    fn poll(&self, uri: &str) -> Result<StatementResponse> {
        // Busy retries are bounded by the session timeout so a persistently
        // overloaded coordinator cannot hold the session lock forever.
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        loop {
            let response = self.client.get(uri).send().map_err(|e| {
                AskdbError::query_execution(format!("failed to poll statement status: {e}"))
            })?;

            // A busy coordinator answers 503; retry the same URI.
            if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                if Instant::now() >= deadline {
                    return Err(AskdbError::query_execution(format!(
                        "coordinator still busy after {}s, giving up",
                        self.config.timeout_secs
                    )));
                }
                warn!("coordinator busy, retrying poll");
                std::thread::sleep(Duration::from_millis(BUSY_RETRY_DELAY_MS));
                continue;
            }

            return Self::read_statement_response(response);
        }
    }

    fn read_statement_response(response: reqwest::blocking::Response) -> Result<StatementResponse> {
        let status = response.status();
        let body = response.text().map_err(|e| {
            AskdbError::query_execution(format!("failed to read statement response: {e}"))
        })?;

        if !status.is_success() {
            return Err(AskdbError::query_execution(format!(
                "statement request failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            AskdbError::query_execution(format!("failed to parse statement response: {e}"))
        })
    }

    /// Zips positional values against column names, keeping column order.
    fn to_rows(columns: &[String], raw_rows: Vec<Vec<serde_json::Value>>) -> Vec<Row> {
        raw_rows
            .into_iter()
            .map(|values| {
                let mut row = Row::new();
                for (name, value) in columns.iter().zip(values) {
                    row.insert(name.clone(), value);
                }
                row
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[allow(dead_code)]
    id: Option<String>,
    next_uri: Option<String>,
    columns: Option<Vec<StatementColumn>>,
    data: Option<Vec<Vec<serde_json::Value>>>,
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementError {
    message: Option<String>,
    error_name: Option<String>,
    error_type: Option<String>,
}

impl StatementError {
    /// User-facing error text, e.g. `SYNTAX_ERROR: line 1:8: ...`.
    fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown engine error");
        match self.error_name.as_deref().or(self.error_type.as_deref()) {
            Some(name) => format!("{name}: {message}"),
            None => message.to_string(),
        }
    }
}

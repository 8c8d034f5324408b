//! Request and result models for the query pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AskdbError, Result};

/// A single result row: column name to value, in result-set column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A request to generate or execute a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Unique id for this request.
    pub id: Uuid,

    /// The user's question, trimmed and non-empty.
    pub user_query: String,

    /// A prior execution failure, carried for self-correction.
    pub previous_error: Option<String>,

    /// Free-form key/value bag (correlation ids and similar).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl QueryRequest {
    /// Creates a request from a user question.
    ///
    /// The question is trimmed; an empty question is rejected.
    pub fn new(user_query: impl Into<String>) -> Result<Self> {
        let trimmed = user_query.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(AskdbError::internal("user_query cannot be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_query: trimmed,
            previous_error: None,
            metadata: HashMap::new(),
        })
    }

    /// Attaches a prior execution error for corrective regeneration.
    pub fn with_previous_error(mut self, error: impl Into<String>) -> Self {
        self.previous_error = Some(error.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Structured representation of a query execution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Id of the originating request.
    pub query_id: Uuid,

    /// The SQL that was (or would have been) executed.
    pub sql: String,

    /// Result rows in execution order.
    pub rows: Vec<Row>,

    /// Column names in result-set order.
    pub columns: Vec<String>,

    /// Row count; equals `rows.len()` unless explicitly overridden.
    pub row_count: usize,

    /// Wall-clock execution time, when measured.
    pub execution_ms: Option<u64>,

    /// Reserved for future result caching.
    #[serde(default)]
    pub cached: bool,
}

impl QueryResult {
    /// Creates a result from rows and columns; `row_count` tracks `rows.len()`.
    pub fn with_rows(query_id: Uuid, sql: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            query_id,
            sql: sql.into(),
            rows,
            columns,
            row_count,
            execution_ms: None,
            cached: false,
        }
    }

    /// Creates an empty, uncached preview result that echoes the input SQL.
    ///
    /// Returned when execution is disabled by configuration.
    pub fn preview(query_id: Uuid, sql: impl Into<String>) -> Self {
        Self::with_rows(query_id, sql, Vec::new(), Vec::new())
    }

    /// Sets the measured execution time.
    pub fn with_execution_ms(mut self, execution_ms: u64) -> Self {
        self.execution_ms = Some(execution_ms);
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Record persisted for query history and auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistoryRecord {
    /// When the query ran.
    pub timestamp: DateTime<Utc>,
    /// Id of the originating request.
    pub query_id: Uuid,
    /// Engine user the query ran as.
    pub user: String,
    /// The executed SQL.
    pub sql: String,
    /// Whether execution succeeded.
    pub success: bool,
    /// Rows returned (0 on failure).
    pub row_count: usize,
    /// The natural-language question, when known.
    pub user_question: Option<String>,
    /// The engine schema the query ran against.
    pub schema_name: Option<String>,
    /// Request metadata carried through for correlation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

//! Mock query executor for testing.
//!
//! Returns canned result sets keyed by SQL substring, so pipeline tests run
//! without an engine.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::db::QueryExecutor;
use crate::error::{AskdbError, Result};
use crate::models::{QueryRequest, QueryResult, Row};

/// Mock executor with canned result sets.
#[derive(Debug, Default)]
pub struct MockQueryExecutor {
    /// Canned result sets (pattern contained in SQL -> (columns, rows)).
    canned: Vec<(String, (Vec<String>, Vec<Row>))>,
    /// When set, every execution fails with this execution error.
    failure: Option<String>,
    /// SQL statements executed so far.
    executed: Mutex<Vec<String>>,
    /// Whether `close` has been called.
    closed: Mutex<bool>,
}

impl MockQueryExecutor {
    /// Creates an executor that answers every statement with an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a canned result: when the SQL contains `pattern`
    /// (case-insensitive), the given columns and rows are returned.
    pub fn with_result(
        mut self,
        pattern: impl Into<String>,
        columns: Vec<&str>,
        rows: Vec<Row>,
    ) -> Self {
        let columns = columns.into_iter().map(String::from).collect();
        self.canned.push((pattern.into(), (columns, rows)));
        self
    }

    /// Makes every execution fail with the given message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Statements executed so far.
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Builds a single row from (column, value) pairs, keeping order.
    pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        let mut row = Row::new();
        for (name, value) in pairs {
            row.insert((*name).to_string(), value.clone());
        }
        row
    }
}

#[async_trait]
impl QueryExecutor for MockQueryExecutor {
    async fn execute(&self, request: &QueryRequest, sql: &str) -> Result<QueryResult> {
        self.executed.lock().push(sql.to_string());

        if let Some(message) = &self.failure {
            return Err(AskdbError::query_execution(message.clone()));
        }

        let sql_lower = sql.to_lowercase();
        for (pattern, (columns, rows)) in &self.canned {
            if sql_lower.contains(&pattern.to_lowercase()) {
                return Ok(QueryResult::with_rows(
                    request.id,
                    sql,
                    columns.clone(),
                    rows.clone(),
                )
                .with_execution_ms(1));
            }
        }

        Ok(QueryResult::with_rows(request.id, sql, Vec::new(), Vec::new()).with_execution_ms(1))
    }

    async fn ping(&self) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(AskdbError::database_connection(message.clone()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

//! Shared database manager.
//!
//! Owns the single engine session behind a mutex: concurrent requests queue
//! on the lock and run one statement at a time. The session is created on
//! first use and every statement runs inside `spawn_blocking`, keeping the
//! blocking REST protocol off the async scheduler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::presto::{PrestoSession, PrestoSessionConfig};
use crate::db::QueryExecutor;
use crate::error::{AskdbError, Result};
use crate::history::QueryHistory;
use crate::models::{QueryHistoryRecord, QueryRequest, QueryResult, Row};

/// Serializes all engine access through one lazily-created session.
pub struct DatabaseManager {
    config: Arc<Config>,
    session: Arc<Mutex<Option<PrestoSession>>>,
    history: QueryHistory,
}

impl DatabaseManager {
    /// Creates a manager; no connection is made until the first statement.
    pub fn new(config: Arc<Config>) -> Self {
        let history = QueryHistory::new(config.query_history_path.clone());
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
            history,
        }
    }

    fn session_config(config: &Config) -> PrestoSessionConfig {
        PrestoSessionConfig {
            host: config.presto_host.clone(),
            port: config.presto_port,
            user: config.presto_user.clone(),
            catalog: config.presto_catalog.clone(),
            schema: config.presto_schema.clone(),
            timeout_secs: config.presto_timeout_secs,
        }
    }

    /// Runs `op` against the session, connecting first if needed.
    ///
    /// Callers hold the session lock for the whole statement, so statements
    /// from concurrent requests execute strictly one at a time.
    fn with_session<T>(
        config: &Config,
        slot: &Mutex<Option<PrestoSession>>,
        op: impl FnOnce(&PrestoSession) -> Result<T>,
    ) -> Result<T> {
        let mut guard = slot.lock();
        if guard.is_none() {
            debug!(host = %config.presto_host, "opening engine session");
            *guard = Some(PrestoSession::connect(Self::session_config(config))?);
        }
        match guard.as_ref() {
            Some(session) => op(session),
            None => Err(AskdbError::internal("engine session missing after connect")),
        }
    }

    fn record_history(
        history: &QueryHistory,
        config: &Config,
        request: &QueryRequest,
        sql: &str,
        success: bool,
        row_count: usize,
    ) {
        let record = QueryHistoryRecord {
            timestamp: Utc::now(),
            query_id: request.id,
            user: config.presto_user.clone(),
            sql: sql.to_string(),
            success,
            row_count,
            user_question: Some(request.user_query.clone()),
            schema_name: Some(config.presto_schema.clone()),
            metadata: request.metadata.clone(),
        };

        // Auditing never blocks or fails the query itself.
        if let Err(e) = history.append(&record) {
            warn!(error = %e, "failed to append query history record");
        }
    }
}

#[async_trait]
impl QueryExecutor for DatabaseManager {
    async fn execute(&self, request: &QueryRequest, sql: &str) -> Result<QueryResult> {
        if !self.config.execute_queries {
            info!(query_id = %request.id, "execution disabled, returning SQL preview");
            return Ok(QueryResult::preview(request.id, sql));
        }

        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.session);
        let history = self.history.clone();
        let request = request.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let outcome = Self::with_session(&config, &slot, |session| session.execute(&sql));
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok((columns, rows)) => {
                    // Statements with no result shape (DDL and the like)
                    // report as an empty result set.
                    let (columns, rows): (Vec<String>, Vec<Row>) = if columns.is_empty() {
                        (Vec::new(), Vec::new())
                    } else {
                        (columns, rows)
                    };

                    Self::record_history(&history, &config, &request, &sql, true, rows.len());
                    Ok(
                        QueryResult::with_rows(request.id, sql, columns, rows)
                            .with_execution_ms(elapsed_ms),
                    )
                }
                Err(e) => {
                    Self::record_history(&history, &config, &request, &sql, false, 0);
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| AskdbError::internal(format!("execution task failed: {e}")))?
    }

    async fn ping(&self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.session);

        tokio::task::spawn_blocking(move || {
            Self::with_session(&config, &slot, |session| session.ping())
        })
        .await
        .map_err(|e| AskdbError::internal(format!("ping task failed: {e}")))?
    }

    async fn close(&self) -> Result<()> {
        let session = self.session.lock().take();
        if session.is_some() {
            info!("engine session closed");
        }
        Ok(())
    }
}

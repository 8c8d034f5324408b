//! Database access for askdb.
//!
//! The pipeline only sees the `QueryExecutor` trait. The production
//! implementation (`DatabaseManager` over a `PrestoSession`) serializes all
//! work through one engine session; the mock swaps in for tests.

pub mod manager;
pub mod mock;
pub mod presto;

pub use manager::DatabaseManager;
pub use mock::MockQueryExecutor;
pub use presto::{PrestoSession, PrestoSessionConfig};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{QueryRequest, QueryResult};

/// Executes generated SQL on behalf of a request.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs the SQL and returns a structured result.
    async fn execute(&self, request: &QueryRequest, sql: &str) -> Result<QueryResult>;

    /// Verifies connectivity to the engine.
    async fn ping(&self) -> Result<()>;

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

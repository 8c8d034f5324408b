//! Append-only query history.
//!
//! Every executed query is recorded as one JSON line. History writes are
//! best-effort: the caller logs and swallows failures so auditing never
//! blocks query execution.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AskdbError, Result};
use crate::models::QueryHistoryRecord;

/// JSONL writer for executed-query records.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    path: PathBuf,
}

impl QueryHistory {
    /// Creates a history writer targeting the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file records are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a JSON line, creating the file if needed.
    pub fn append(&self, record: &QueryHistoryRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| AskdbError::internal(format!("failed to serialize history record: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AskdbError::internal(format!("failed to create history directory: {e}"))
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AskdbError::internal(format!("failed to open history file: {e}")))?;

        writeln!(file, "{line}")
            .map_err(|e| AskdbError::internal(format!("failed to write history record: {e}")))
    }

    /// Reads every record in the file, skipping lines that fail to parse.
    pub fn read_all(&self) -> Result<Vec<QueryHistoryRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AskdbError::internal(format!(
                    "failed to read history file: {e}"
                )))
            }
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

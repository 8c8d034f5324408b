//! Schema loading with single-flight semantics.
//!
//! The catalog is loaded from disk exactly once per process. Concurrent first
//! callers share one underlying load: the first caller kicks off the load and
//! every caller (including the first) awaits the same completion signal, so
//! all of them observe the same catalog or the same failure. A failed load is
//! not cached; a later call may retry.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::{AskdbError, Result};
use crate::schema::SchemaCatalog;

/// Outcome published to waiters. The error is carried as a string so every
/// waiter can receive its own copy.
type LoadOutcome = std::result::Result<Arc<SchemaCatalog>, String>;

/// Provides read access to the schema catalog.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Returns the catalog, loading it on first call.
    ///
    /// Idempotent and safe under concurrent first-call races: exactly one
    /// load executes even if many callers race here before it completes.
    async fn get_schema(&self) -> Result<Arc<SchemaCatalog>>;

    /// Blocks until a load triggered elsewhere completes.
    ///
    /// Fails immediately if no load was ever initiated.
    async fn wait_for_schema(&self) -> Result<Arc<SchemaCatalog>>;
}

enum GateState {
    /// No load has run (or the last one failed).
    Idle,
    /// A load is in flight; waiters subscribe to this channel.
    Loading(watch::Receiver<Option<LoadOutcome>>),
    /// The catalog is published and immutable.
    Ready(Arc<SchemaCatalog>),
}

type Loader = Arc<dyn Fn() -> Result<SchemaCatalog> + Send + Sync>;

/// Schema provider backed by a JSON definition file.
pub struct FileSchemaProvider {
    loader: Loader,
    gate: Arc<Mutex<GateState>>,
}

impl FileSchemaProvider {
    /// Creates a provider that loads the catalog from the given JSON file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::with_loader(Arc::new(move || load_catalog_from_file(&path)))
    }

    /// Creates a provider with a custom load function.
    ///
    /// Used by tests to observe and control the underlying load.
    pub fn with_loader(loader: Loader) -> Self {
        Self {
            loader,
            gate: Arc::new(Mutex::new(GateState::Idle)),
        }
    }

    /// Starts the load on a detached task so its completion is published even
    /// if the initiating caller is cancelled mid-await.
    fn spawn_load(&self, tx: watch::Sender<Option<LoadOutcome>>) {
        let loader = Arc::clone(&self.loader);
        let gate = Arc::clone(&self.gate);

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || loader())
                .await
                .unwrap_or_else(|e| {
                    Err(AskdbError::schema_load(format!("schema load task failed: {e}")))
                });

            let outcome: LoadOutcome = result.map(Arc::new).map_err(|e| e.to_string());

            // Publish the gate transition before waking waiters so a waiter
            // that immediately re-enters get_schema sees a consistent state.
            {
                let mut gate = gate.lock().await;
                *gate = match &outcome {
                    Ok(catalog) => {
                        info!(tables = catalog.tables.len(), "schema catalog loaded");
                        GateState::Ready(Arc::clone(catalog))
                    }
                    Err(reason) => {
                        debug!(%reason, "schema load failed; gate reset for retry");
                        GateState::Idle
                    }
                };
            }
            let _ = tx.send(Some(outcome));
        });
    }

    async fn await_outcome(
        mut rx: watch::Receiver<Option<LoadOutcome>>,
    ) -> Result<Arc<SchemaCatalog>> {
        loop {
            let current = rx.borrow().clone();
            if let Some(outcome) = current {
                return outcome.map_err(AskdbError::schema_load);
            }
            rx.changed()
                .await
                .map_err(|_| AskdbError::schema_load("schema load task was dropped"))?;
        }
    }
}

#[async_trait]
impl SchemaProvider for FileSchemaProvider {
    async fn get_schema(&self) -> Result<Arc<SchemaCatalog>> {
        let rx = {
            let mut gate = self.gate.lock().await;
            match &*gate {
                GateState::Ready(catalog) => return Ok(Arc::clone(catalog)),
                GateState::Loading(rx) => rx.clone(),
                GateState::Idle => {
                    let (tx, rx) = watch::channel(None);
                    *gate = GateState::Loading(rx.clone());
                    self.spawn_load(tx);
                    rx
                }
            }
        };
        Self::await_outcome(rx).await
    }

    async fn wait_for_schema(&self) -> Result<Arc<SchemaCatalog>> {
        let rx = {
            let gate = self.gate.lock().await;
            match &*gate {
                GateState::Ready(catalog) => return Ok(Arc::clone(catalog)),
                GateState::Loading(rx) => rx.clone(),
                GateState::Idle => {
                    return Err(AskdbError::schema_load(
                        "no schema load has been initiated",
                    ))
                }
            }
        };
        Self::await_outcome(rx).await
    }
}

/// Reads and parses the schema definition file.
fn load_catalog_from_file(path: &std::path::Path) -> Result<SchemaCatalog> {
    if !path.exists() {
        return Err(AskdbError::schema_load(format!(
            "schema file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| AskdbError::schema_load(format!("failed to read schema file: {e}")))?;

    let data: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| AskdbError::schema_load(format!("failed to parse schema file: {e}")))?;

    SchemaCatalog::from_json(&data)
}

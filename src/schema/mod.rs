//! Schema catalog model for askdb.
//!
//! In-memory representation of the table/column metadata the generator is
//! allowed to reference, including calculated-metric formulas. Built once per
//! process from a JSON definition and treated as immutable afterwards.

mod provider;

pub use provider::{FileSchemaProvider, SchemaProvider};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AskdbError, Result};

/// A column or calculated metric that can appear in generated SQL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Physical column identifier.
    pub name: String,

    /// Engine-reported type string (e.g. "varchar", "bigint").
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: String,

    /// Friendly name exposed to the user; falls back to `name`.
    pub field_name: Option<String>,

    /// Used for prompt grounding and value-mapping hints.
    pub description: Option<String>,

    /// When present and non-empty, this expression replaces the raw column
    /// in generated SQL.
    pub formula: Option<String>,
}

fn default_column_type() -> String {
    "text".to_string()
}

impl SchemaColumn {
    /// Creates a column with the given physical name and type.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            field_name: None,
            description: None,
            formula: None,
        }
    }

    /// Sets the friendly label.
    pub fn with_label(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the formula, making the column calculated.
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// The user-facing label for this column.
    pub fn label(&self) -> &str {
        self.field_name.as_deref().unwrap_or(&self.name)
    }

    /// A column with a non-empty formula is always treated as calculated,
    /// never as a raw column reference.
    pub fn is_calculated(&self) -> bool {
        self.formula.as_deref().is_some_and(|f| !f.trim().is_empty())
    }

    /// Renders the column for the generation prompt.
    ///
    /// Calculated columns render as `label := formula`; base columns as
    /// `label -> name (type)`. A description, when present, is appended as
    /// ` - description`.
    pub fn render(&self) -> String {
        let description = self
            .description
            .as_deref()
            .map(|d| format!(" - {d}"))
            .unwrap_or_default();

        match self.formula.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(formula) => format!("{} := {}{}", self.label(), formula, description),
            None => format!(
                "{} -> {} ({}){}",
                self.label(),
                self.name,
                self.column_type,
                description
            ),
        }
    }
}

/// Schema metadata for one physical table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaTable {
    /// Table name.
    pub name: String,

    /// Columns in definition order.
    pub columns: Vec<SchemaColumn>,
}

impl SchemaTable {
    /// Creates a table with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Looks up a column by physical name or label, case-insensitively.
    pub fn get_column(&self, name: &str) -> Option<&SchemaColumn> {
        let lowered = name.to_lowercase();
        self.columns.iter().find(|col| {
            col.name.to_lowercase() == lowered
                || col
                    .field_name
                    .as_deref()
                    .is_some_and(|label| label.to_lowercase() == lowered)
        })
    }
}

/// The full set of tables available for query generation.
///
/// Owned exclusively by the schema provider after the first successful load
/// and read-only for everyone else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Tables keyed by name.
    pub tables: BTreeMap<String, SchemaTable>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any existing table with the same name.
    pub fn add_table(&mut self, table: SchemaTable) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Looks up a table by exact name, falling back to a case-insensitive scan.
    pub fn get_table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.get(name).or_else(|| {
            let lowered = name.to_lowercase();
            self.tables
                .values()
                .find(|table| table.name.to_lowercase() == lowered)
        })
    }

    /// Returns true when the catalog has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Renders the catalog for the generation prompt, one block per table
    /// with base columns and calculated metrics split into groups.
    pub fn render_for_prompt(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        for (table_name, table) in &self.tables {
            lines.push(format!("Table: {table_name}"));

            let (metrics, base): (Vec<_>, Vec<_>) =
                table.columns.iter().partition(|col| col.is_calculated());

            if !base.is_empty() {
                lines.push("  Base Columns:".to_string());
                lines.extend(base.iter().map(|col| format!("    - {}", col.render())));
            }
            if !metrics.is_empty() {
                lines.push("  Calculated Metrics:".to_string());
                lines.extend(metrics.iter().map(|col| format!("    - {}", col.render())));
            }
            lines.push(String::new());
        }

        lines.join("\n").trim().to_string()
    }

    /// Builds a catalog from the JSON schema definition.
    ///
    /// The definition is an object keyed by table name, each value carrying a
    /// `columns` array. Column entries that are not objects are skipped, not
    /// fatal.
    pub fn from_json(data: &serde_json::Value) -> Result<Self> {
        let tables = data.as_object().ok_or_else(|| {
            AskdbError::schema_load(
                "schema JSON must be an object keyed by table name with a 'columns' list",
            )
        })?;

        let mut catalog = Self::new();
        for (table_name, table_data) in tables {
            let mut columns = Vec::new();
            let entries = table_data
                .get("columns")
                .and_then(|c| c.as_array())
                .cloned()
                .unwrap_or_default();

            for entry in &entries {
                if !entry.is_object() {
                    tracing::warn!(table = %table_name, "skipping non-object column entry");
                    continue;
                }
                let column: SchemaColumn = serde_json::from_value(entry.clone())
                    .unwrap_or_else(|_| SchemaColumn::new("unknown", "unknown"));
                columns.push(column);
            }

            catalog.add_table(SchemaTable::new(table_name.clone(), columns));
        }
        Ok(catalog)
    }
}

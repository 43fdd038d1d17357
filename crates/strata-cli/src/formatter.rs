//! Output formatting for command results.
//!
//! Supports table and JSON output formats.

use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::{json, Value as JsonValue};
use strata_table::Value;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON output.
    Json,
}

/// Column names plus rows of JSON values.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column headers.
    pub columns: Vec<String>,
    /// Row cells, parallel to `columns`.
    pub rows: Vec<Vec<JsonValue>>,
}

impl ResultSet {
    /// Creates an empty result with the given headers.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: Vec<JsonValue>) {
        self.rows.push(row);
    }
}

/// Formats a result according to the specified format.
pub fn format_result(result: &ResultSet, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(result),
        OutputFormat::Json => format_json(result),
    }
}

/// Formats the result as a table.
fn format_table(result: &ResultSet) -> String {
    let mut table = Table::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    if !result.columns.is_empty() {
        table.set_header(result.columns.iter().map(Cell::new));
    }

    for row in &result.rows {
        let cells: Vec<Cell> = row.iter().map(|v| Cell::new(cell_text(v))).collect();
        table.add_row(cells);
    }

    table.to_string()
}

/// Strings print without quotes; everything else prints as JSON.
fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Formats the result as a JSON array of objects.
fn format_json(result: &ResultSet) -> String {
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, value) in row.iter().enumerate() {
                let col_name = result
                    .columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i));
                obj.insert(col_name, value.clone());
            }
            JsonValue::Object(obj)
        })
        .collect();

    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// Converts a column value to JSON.
///
/// Byte strings that are not UTF-8 become `0x`-prefixed hex.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Int64(v) => json!(*v),
        Value::Bytes(_) => json!(value.to_string()),
    }
}

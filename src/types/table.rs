//! In-memory transaction table

use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Name of the column carrying transaction identifiers
pub const ID_COLUMN: &str = "tr_id";

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    /// Text content, if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value for model input.
    ///
    /// Nulls map to NaN, the missing-value marker tree models expect.
    /// Text has no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Null => Some(f64::NAN),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Number(n) => Some(*n),
            Cell::Text(_) => None,
        }
    }

    fn from_json(value: &Value) -> ConfigResult<Self> {
        match value {
            Value::Null => Ok(Cell::Null),
            Value::Bool(b) => Ok(Cell::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Cell::Number).ok_or_else(|| {
                ConfigError::InvalidDataType {
                    reason: format!("number {} is not representable as f64", n),
                }
            }),
            Value::String(s) => Ok(Cell::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(ConfigError::InvalidDataType {
                reason: "cells must be scalar values".to_string(),
            }),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// Ordered rows of named columns, addressed by the `tr_id` column.
///
/// Construction does not validate; [`TransactionTable::validate`] checks the
/// structure when the table is handed to the patrol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TransactionTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from JSON.
    ///
    /// Accepts either records (`[{"tr_id": "T1", ...}, ...]`) or a column
    /// map (`{"tr_id": ["T1", ...], ...}`). Anything else is not a table.
    pub fn from_json(value: &Value) -> ConfigResult<Self> {
        let table = match value {
            Value::Array(records) => Self::from_records(records)?,
            Value::Object(columns) => {
                let mut names = Vec::with_capacity(columns.len());
                let mut data = Vec::with_capacity(columns.len());
                for (name, values) in columns {
                    let values = values.as_array().ok_or_else(|| ConfigError::InvalidDataType {
                        reason: format!("column {} is not an array", name),
                    })?;
                    names.push(name.clone());
                    data.push(values);
                }

                let height = data.first().map(|c| c.len()).unwrap_or(0);
                if let Some(pos) = data.iter().position(|c| c.len() != height) {
                    return Err(ConfigError::InvalidDataType {
                        reason: format!(
                            "column {} has {} values, expected {}",
                            names[pos],
                            data[pos].len(),
                            height
                        ),
                    });
                }

                let mut rows = Vec::with_capacity(height);
                for i in 0..height {
                    let row = data
                        .iter()
                        .map(|column| Cell::from_json(&column[i]))
                        .collect::<ConfigResult<Vec<_>>>()?;
                    rows.push(row);
                }
                Self::new(names, rows)
            }
            Value::Null => return Err(ConfigError::MissingData),
            other => {
                return Err(ConfigError::InvalidDataType {
                    reason: format!("expected records or a column map, got {}", json_kind(other)),
                })
            }
        };

        table.validate()?;
        Ok(table)
    }

    fn from_records(records: &[Value]) -> ConfigResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let fields = record.as_object().ok_or_else(|| ConfigError::InvalidDataType {
                reason: format!("record is {}, expected an object", json_kind(record)),
            })?;
            for key in fields.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            // Checked above
            let Some(fields) = record.as_object() else {
                continue;
            };
            let row = columns
                .iter()
                .map(|c| fields.get(c).map(Cell::from_json).unwrap_or(Ok(Cell::Null)))
                .collect::<ConfigResult<Vec<_>>>()?;
            rows.push(row);
        }

        Ok(Self::new(columns, rows))
    }

    /// Read a JSON table from disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let load_error = |message: String| ConfigError::DataLoad {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Check the table is structurally sound: unique column names and every
    /// row as wide as the header. Row count is not checked.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::InvalidDataType {
                    reason: format!("duplicate column name {}", column),
                });
            }
        }

        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            return Err(ConfigError::InvalidDataType {
                reason: format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    self.columns.len()
                ),
            });
        }

        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Number of rows whose id contains `needle` as a substring
    pub fn count_ids_containing(&self, id_column: usize, needle: &str) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.get(id_column).and_then(Cell::as_text))
            .filter(|id| id.contains(needle))
            .count()
    }

    /// Indices of rows whose id equals `id` exactly
    pub fn rows_with_id(&self, id_column: usize, id: &str) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(id_column).and_then(Cell::as_text) == Some(id))
            .map(|(i, _)| i)
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

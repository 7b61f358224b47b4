use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{CoreError, Result};

/// Marker stored for cells that could not be read as a number.
pub const MISSING: f64 = f64::NAN;

// ---------------------------------------------------------------------------
// Column – one named numeric series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the canonical parsed representation of a file
// ---------------------------------------------------------------------------

/// Ordered numeric columns of equal length plus the file they came from.
///
/// The provenance column is implicit: every row carries `source`, exposed
/// through [`Table::provenance`] and in [`Table::to_records`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub source: PathBuf,
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table from row-major data. Short rows are padded with
    /// [`MISSING`], extra cells are ignored.
    pub fn from_rows(source: &Path, names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        let n_rows = rows.len();
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(n_rows)))
            .collect();

        for row in &rows {
            for (j, col) in columns.iter_mut().enumerate() {
                col.values.push(row.get(j).copied().unwrap_or(MISSING));
            }
        }

        Table {
            source: source.to_path_buf(),
            columns,
            rows: n_rows,
        }
    }

    /// Build a table from whole columns, which must all have the same length.
    pub fn from_columns(source: &Path, columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
            return Err(CoreError::malformed(
                source,
                format!(
                    "column `{}` has {} values, expected {rows}",
                    bad.name,
                    bad.values.len()
                ),
            ));
        }
        Ok(Table {
            source: source.to_path_buf(),
            columns,
            rows,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in file order (the provenance column is not included).
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`Table::column`] but reports which file lacked the column.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| CoreError::UnknownColumn {
            column: name.to_string(),
            path: self.source.clone(),
        })
    }

    /// Multiply every value of a column in place. Returns false if absent.
    pub fn scale_column(&mut self, name: &str, factor: f64) -> bool {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => {
                col.values.iter_mut().for_each(|v| *v *= factor);
                true
            }
            None => false,
        }
    }

    /// The provenance value shared by every row.
    pub fn provenance(&self) -> String {
        self.source.display().to_string()
    }

    /// Row objects for a data grid. Missing values become `null`.
    pub fn to_records(&self, provenance_key: &str) -> Vec<Map<String, JsonValue>> {
        let provenance = JsonValue::String(self.provenance());
        (0..self.rows)
            .map(|i| {
                let mut row = Map::with_capacity(self.columns.len() + 1);
                for col in &self.columns {
                    let cell = Number::from_f64(col.values[i])
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null);
                    row.insert(col.name.clone(), cell);
                }
                row.insert(provenance_key.to_string(), provenance.clone());
                row
            })
            .collect()
    }
}

/// Concatenate the records of several tables, in order.
pub fn stack_records(tables: &[Table], provenance_key: &str) -> Vec<Map<String, JsonValue>> {
    tables
        .iter()
        .flat_map(|t| t.to_records(provenance_key))
        .collect()
}
